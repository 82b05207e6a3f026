//! Error types for the batch pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// A broken rule of the batch exchange contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Feature pair refers to a row beyond the filled samples
    RowOutOfRange { row: u32, size: u32 },
    /// Feature index outside the encoder's range
    FeatureOutOfRange { feature: u32 },
    /// Same `(row, feature)` pair listed twice
    DuplicateFeature { row: u32, feature: u32 },
    /// A buffer's length disagrees with the counts describing it
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    /// Declared size larger than the buffer's capacity
    SizeExceedsCapacity { size: u32, capacity: u32 },
    /// Sample pushed into a full batch
    BatchFull { capacity: u32 },
    /// Sample with more active features than a board can hold
    TooManyFeatures { found: usize },
    /// Load requested after the epoch boundary without reopening
    LoadAfterEpochWrap,
    /// Load requested on a closed loader
    LoaderClosed,
    /// Producer-allocated batches need a nonzero batch size
    ZeroBatchSize,
    /// Null pointer passed where a live handle is required
    NullHandle,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::RowOutOfRange { row, size } => {
                write!(f, "row {row} out of range for batch of size {size}")
            }
            Violation::FeatureOutOfRange { feature } => {
                write!(f, "feature index {feature} out of range")
            }
            Violation::DuplicateFeature { row, feature } => {
                write!(f, "feature {feature} listed twice for row {row}")
            }
            Violation::LengthMismatch {
                field,
                expected,
                found,
            } => write!(f, "{field} holds {found} values, expected {expected}"),
            Violation::SizeExceedsCapacity { size, capacity } => {
                write!(f, "size {size} exceeds capacity {capacity}")
            }
            Violation::BatchFull { capacity } => {
                write!(f, "batch already holds {capacity} samples")
            }
            Violation::TooManyFeatures { found } => {
                write!(f, "sample has {found} active features")
            }
            Violation::LoadAfterEpochWrap => {
                write!(f, "load after the epoch ended; reopen the loader first")
            }
            Violation::LoaderClosed => write!(f, "load on a closed loader"),
            Violation::ZeroBatchSize => {
                write!(f, "batch size 0 needs a caller-provided buffer")
            }
            Violation::NullHandle => write!(f, "null handle"),
        }
    }
}

impl Violation {
    /// Numeric code reported across the C ABI
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Violation::RowOutOfRange { .. } => 16,
            Violation::FeatureOutOfRange { .. } => 17,
            Violation::DuplicateFeature { .. } => 18,
            Violation::LengthMismatch { .. } => 19,
            Violation::SizeExceedsCapacity { .. } => 20,
            Violation::BatchFull { .. } => 21,
            Violation::TooManyFeatures { .. } => 22,
            Violation::LoadAfterEpochWrap => 23,
            Violation::LoaderClosed => 24,
            Violation::ZeroBatchSize => 25,
            Violation::NullHandle => 26,
        }
    }

    /// Inverse of [`Violation::code`] for the violations that carry no data
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            23 => Some(Violation::LoadAfterEpochWrap),
            24 => Some(Violation::LoaderClosed),
            25 => Some(Violation::ZeroBatchSize),
            26 => Some(Violation::NullHandle),
            _ => None,
        }
    }
}

/// Error type for batch loading
#[derive(Debug)]
pub enum DataError {
    /// Dataset could not be opened or is not a packed-sample stream
    SourceUnavailable { path: PathBuf, reason: String },
    /// Caller or buffer broke the exchange contract
    ContractViolation(Violation),
    /// Read failure while streaming
    Io(io::Error),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::SourceUnavailable { path, reason } => {
                write!(f, "Cannot open dataset {}: {reason}", path.display())
            }
            DataError::ContractViolation(violation) => {
                write!(f, "Batch contract violation: {violation}")
            }
            DataError::Io(err) => write!(f, "Dataset read error: {err}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Violation> for DataError {
    fn from(violation: Violation) -> Self {
        DataError::ContractViolation(violation)
    }
}

impl From<io::Error> for DataError {
    fn from(err: io::Error) -> Self {
        DataError::Io(err)
    }
}

impl DataError {
    /// Numeric code reported across the C ABI; never 0
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            DataError::SourceUnavailable { .. } => 1,
            DataError::Io(_) => 2,
            DataError::ContractViolation(violation) => violation.code(),
        }
    }

    /// The violated rule, if this is a contract violation
    #[must_use]
    pub fn violation(&self) -> Option<Violation> {
        match self {
            DataError::ContractViolation(v) => Some(*v),
            _ => None,
        }
    }
}
