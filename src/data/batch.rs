//! Fixed-capacity batch buffer shared between producer and consumer.
//!
//! Feature lists are stored as interleaved `(row, feature)` pairs of `u32`,
//! the layout the consumer reads straight through the C ABI. Storage is
//! allocated once for the worst case and refilled in place.

use super::error::Violation;
use super::sample::Sample;
use crate::nnue::{PositionFeatures, FEATURE_COUNT, MAX_ACTIVE_FEATURES};

/// Reusable batch storage
#[derive(Clone, Debug)]
pub struct Batch {
    capacity: u32,
    size: u32,
    total_features: u32,
    stm_features: Box<[u32]>,
    non_stm_features: Box<[u32]>,
    evals: Box<[f32]>,
    outcomes: Box<[f32]>,
}

impl Batch {
    /// Allocate a batch able to hold `capacity` samples
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        let samples = capacity as usize;
        Batch {
            capacity,
            size: 0,
            total_features: 0,
            stm_features: vec![0; 2 * MAX_ACTIVE_FEATURES * samples].into(),
            non_stm_features: vec![0; 2 * MAX_ACTIVE_FEATURES * samples].into(),
            evals: vec![0.0; samples].into(),
            outcomes: vec![0.0; samples].into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Samples filled by the last load
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn total_features(&self) -> u32 {
        self.total_features
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Forget the contents without touching the storage
    #[inline]
    pub fn clear(&mut self) {
        self.size = 0;
        self.total_features = 0;
    }

    /// Append a sample's features and targets
    pub fn push(&mut self, sample: &Sample) -> Result<(), Violation> {
        let features = PositionFeatures::new(&sample.position);
        self.push_features(&features, sample.eval_target(), sample.outcome_target())
    }

    /// Append pre-computed features; `stm[k]` and `non_stm[k]` must describe the same piece.
    pub fn push_features(
        &mut self,
        features: &PositionFeatures,
        eval: f32,
        outcome: f32,
    ) -> Result<(), Violation> {
        if self.is_full() {
            return Err(Violation::BatchFull {
                capacity: self.capacity,
            });
        }
        if features.stm.len() != features.non_stm.len() {
            return Err(Violation::LengthMismatch {
                field: "non_stm_features",
                expected: features.stm.len(),
                found: features.non_stm.len(),
            });
        }
        if features.len() > MAX_ACTIVE_FEATURES {
            return Err(Violation::TooManyFeatures {
                found: features.len(),
            });
        }
        if let Some(&feature) = features
            .stm
            .iter()
            .chain(&features.non_stm)
            .find(|&&f| f as usize >= FEATURE_COUNT)
        {
            return Err(Violation::FeatureOutOfRange { feature });
        }

        let row = self.size;
        let mut index = 2 * self.total_features as usize;
        for (stm, non_stm) in features.pairs() {
            self.stm_features[index] = row;
            self.stm_features[index + 1] = stm;
            self.non_stm_features[index] = row;
            self.non_stm_features[index + 1] = non_stm;
            index += 2;
        }
        self.total_features += features.len() as u32;
        self.evals[row as usize] = eval;
        self.outcomes[row as usize] = outcome;
        self.size += 1;
        Ok(())
    }

    /// Interleaved `(row, feature)` pairs for the side to move
    #[inline]
    #[must_use]
    pub fn stm_features(&self) -> &[u32] {
        &self.stm_features[..2 * self.total_features as usize]
    }

    /// Interleaved `(row, feature)` pairs for the other side
    #[inline]
    #[must_use]
    pub fn non_stm_features(&self) -> &[u32] {
        &self.non_stm_features[..2 * self.total_features as usize]
    }

    #[inline]
    #[must_use]
    pub fn evals(&self) -> &[f32] {
        &self.evals[..self.size as usize]
    }

    #[inline]
    #[must_use]
    pub fn outcomes(&self) -> &[f32] {
        &self.outcomes[..self.size as usize]
    }

    /// Read-only view of the filled part
    #[must_use]
    pub fn view(&self) -> BatchView<'_> {
        BatchView {
            capacity: self.capacity,
            size: self.size,
            stm_features: self.stm_features(),
            non_stm_features: self.non_stm_features(),
            evals: self.evals(),
            outcomes: self.outcomes(),
        }
    }
}

/// Borrowed, length-checked view of a filled batch.
///
/// Built either from an owned [`Batch`] or from foreign memory; the
/// constructors check every length against `size` and `total_features`
/// so that later indexing cannot go out of bounds.
#[derive(Clone, Copy, Debug)]
pub struct BatchView<'a> {
    capacity: u32,
    size: u32,
    stm_features: &'a [u32],
    non_stm_features: &'a [u32],
    evals: &'a [f32],
    outcomes: &'a [f32],
}

impl<'a> BatchView<'a> {
    /// Check slice lengths against the declared counts
    pub fn from_slices(
        capacity: u32,
        size: u32,
        stm_features: &'a [u32],
        non_stm_features: &'a [u32],
        evals: &'a [f32],
        outcomes: &'a [f32],
    ) -> Result<Self, Violation> {
        if size > capacity {
            return Err(Violation::SizeExceedsCapacity { size, capacity });
        }
        let pairs = stm_features.len();
        if pairs % 2 != 0 {
            return Err(Violation::LengthMismatch {
                field: "stm_features",
                expected: pairs + 1,
                found: pairs,
            });
        }
        if non_stm_features.len() != pairs {
            return Err(Violation::LengthMismatch {
                field: "non_stm_features",
                expected: pairs,
                found: non_stm_features.len(),
            });
        }
        let max_values = 2 * MAX_ACTIVE_FEATURES * capacity as usize;
        if pairs > max_values {
            return Err(Violation::LengthMismatch {
                field: "stm_features",
                expected: max_values,
                found: pairs,
            });
        }
        for (field, values) in [("evals", evals), ("outcomes", outcomes)] {
            if values.len() != size as usize {
                return Err(Violation::LengthMismatch {
                    field,
                    expected: size as usize,
                    found: values.len(),
                });
            }
        }

        Ok(BatchView {
            capacity,
            size,
            stm_features,
            non_stm_features,
            evals,
            outcomes,
        })
    }

    /// View memory owned by someone else, typically across the C ABI.
    ///
    /// Null pointers are accepted only for zero-length arrays.
    ///
    /// # Safety
    /// Each non-null pointer must be valid for reads of the length implied by
    /// `size` and `total_features` (`2 * total_features` for the feature arrays,
    /// `size` for evals and outcomes) for the lifetime `'a`, and the memory must
    /// not be mutated during that lifetime.
    pub unsafe fn from_raw_parts(
        capacity: u32,
        size: u32,
        total_features: u32,
        stm_features: *const u32,
        non_stm_features: *const u32,
        evals: *const f32,
        outcomes: *const f32,
    ) -> Result<Self, Violation> {
        if size > capacity {
            return Err(Violation::SizeExceedsCapacity { size, capacity });
        }
        let max_features = MAX_ACTIVE_FEATURES * capacity as usize;
        if total_features as usize > max_features {
            return Err(Violation::LengthMismatch {
                field: "total_features",
                expected: max_features,
                found: total_features as usize,
            });
        }

        let values = 2 * total_features as usize;
        let samples = size as usize;
        Self::from_slices(
            capacity,
            size,
            raw_slice(stm_features, values, "stm_features")?,
            raw_slice(non_stm_features, values, "non_stm_features")?,
            raw_slice(evals, samples, "evals")?,
            raw_slice(outcomes, samples, "outcomes")?,
        )
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn total_features(&self) -> u32 {
        (self.stm_features.len() / 2) as u32
    }

    #[inline]
    #[must_use]
    pub fn stm_features(&self) -> &'a [u32] {
        self.stm_features
    }

    #[inline]
    #[must_use]
    pub fn non_stm_features(&self) -> &'a [u32] {
        self.non_stm_features
    }

    #[inline]
    #[must_use]
    pub fn evals(&self) -> &'a [f32] {
        self.evals
    }

    #[inline]
    #[must_use]
    pub fn outcomes(&self) -> &'a [f32] {
        self.outcomes
    }

    /// `(row, feature)` pairs for the side to move
    pub fn stm_pairs(&self) -> impl Iterator<Item = (u32, u32)> + 'a {
        pairs(self.stm_features)
    }

    /// `(row, feature)` pairs for the other side
    pub fn non_stm_pairs(&self) -> impl Iterator<Item = (u32, u32)> + 'a {
        pairs(self.non_stm_features)
    }

    /// Check every pair: rows in range, features in range, rows agreeing
    /// between the two perspectives.
    pub fn validate(&self) -> Result<(), Violation> {
        for ((row, stm), (non_stm_row, non_stm)) in self.stm_pairs().zip(self.non_stm_pairs()) {
            if row >= self.size {
                return Err(Violation::RowOutOfRange {
                    row,
                    size: self.size,
                });
            }
            if non_stm_row != row {
                return Err(Violation::RowOutOfRange {
                    row: non_stm_row,
                    size: self.size,
                });
            }
            for feature in [stm, non_stm] {
                if feature as usize >= FEATURE_COUNT {
                    return Err(Violation::FeatureOutOfRange { feature });
                }
            }
        }
        Ok(())
    }
}

fn pairs(values: &[u32]) -> impl Iterator<Item = (u32, u32)> + '_ {
    values.chunks_exact(2).map(|pair| (pair[0], pair[1]))
}

unsafe fn raw_slice<'a, T>(
    ptr: *const T,
    len: usize,
    field: &'static str,
) -> Result<&'a [T], Violation> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(Violation::LengthMismatch {
            field,
            expected: len,
            found: 0,
        });
    }
    // SAFETY: non-null and valid for `len` reads per the caller's contract
    Ok(std::slice::from_raw_parts(ptr, len))
}
