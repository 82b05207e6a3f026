pub mod board;
pub mod config;
pub mod data;
pub mod ffi;
pub mod nnue;

pub use board::{Color, Piece, Position, Square};
pub use config::{Architecture, LoaderConfig, TargetBlend};
pub use data::{Batch, BatchLoader, DataError, DataLoader, EpochStatus, Prefetcher, SparseBatch};
pub use nnue::{feature_index, FloatNetwork, QuantizedNetwork};
