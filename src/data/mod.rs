//! Training data pipeline.
//!
//! Packed samples on disk are decoded by a [`BatchLoader`] into reusable
//! [`Batch`] buffers, which the consumer turns into [`SparseBatch`] matrices.
//! [`DataLoader`] and [`Prefetcher`] wrap the loader for Rust callers; the
//! `ffi` module exposes the same protocol over the C ABI.

mod batch;
mod error;
mod loader;
mod prefetch;
mod sample;
mod sparse;
mod writer;

pub use batch::{Batch, BatchView};
pub use error::{DataError, Violation};
pub use loader::{BatchLoader, DataLoader, EpochStatus};
pub use prefetch::{PrefetchedBatch, Prefetcher};
pub use sample::{Outcome, PackError, PackedSample, Sample, UnpackError, PACKED_SAMPLE_SIZE};
pub use sparse::{SparseBatch, SparseMatrix};
pub use writer::{write_samples, SampleWriter};
