//! NNUE module tests.
//!
//! - `proptest.rs` - Property-based tests for feature indices and quantization
