//! NNUE feature encoding, quantization and weight export.
//!
//! Provides the pieces shared between the data pipeline and the engine:
//! - Perspective-relative sparse feature indices
//! - A float reference network loaded from training checkpoints
//! - Fixed-point quantization with engine-matching scales
//! - The little-endian weight file the engine parses
//!
//! Architecture: (768 -> ft_out) x 2 perspectives -> hidden1 -> hidden2 -> 1

pub mod checkpoint;
pub mod feature;
pub mod network;
pub mod quantize;
pub mod weights;

#[cfg(test)]
mod tests;

pub use checkpoint::{Checkpoint, CheckpointError, Tensor};
pub use feature::{feature_index, PositionFeatures};
pub use network::{win_probability_to_pawns, FloatNetwork, Linear, PAWN_FACTOR};
pub use quantize::{
    dequantize, quantize, quantize_value, IntWidth, LayerRole, QuantizeError, QuantizedTensor,
    QuantizedValues,
};
pub use weights::{weight_file_len, QuantizedNetwork};

/// Input feature count: 64 squares × 6 piece types × 2 relativities
pub const FEATURE_COUNT: usize = 768;

/// Most features a single position can activate per perspective
pub const MAX_ACTIVE_FEATURES: usize = 32;

/// Largest activation value in the engine's integer inference
pub const ACTIVATION_RANGE: i32 = 127;

/// Fixed-point scale of hidden layer weights
pub const WEIGHT_SCALING: i32 = 64;

/// Fixed-point scale of output layer weights
pub const OUTPUT_WEIGHT_SCALING: i32 = 32;

/// Centipawn scale of the network output
pub const OUTPUT_SCALING: i32 = 300;
