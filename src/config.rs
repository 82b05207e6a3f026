//! Tunable settings for loading data and shaping the network.
//!
//! All of these are plain structs with sensible defaults; construct one with
//! `..Default::default()` and override what you need.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::nnue::FEATURE_COUNT;

/// Settings for the batch producer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoaderConfig {
    /// Samples per batch; the effective size is also capped by the buffer's capacity.
    /// 0 fills caller-provided buffers to capacity and is rejected where the
    /// loader allocates its own.
    pub batch_size: u32,
    /// Records read into memory and shuffled before being handed out
    pub shuffle_buffer_samples: usize,
    /// Fixed shuffle seed; `None` draws one from the OS
    pub seed: Option<u64>,
    /// Buffers rotated between the prefetch worker and the consumer
    pub prefetch_buffers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            batch_size: 8192,
            shuffle_buffer_samples: 2_097_152,
            seed: None,
            prefetch_buffers: 2,
        }
    }
}

impl LoaderConfig {
    #[must_use]
    pub fn with_batch_size(batch_size: u32) -> Self {
        LoaderConfig {
            batch_size,
            ..Default::default()
        }
    }
}

/// How evaluation and game result are mixed into one training target.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TargetBlend {
    /// Weight of the evaluation term; the outcome gets `1 - eval_weight`
    pub eval_weight: f32,
    /// Centipawns per logit unit when squashing evaluations
    pub eval_scale: f32,
}

impl Default for TargetBlend {
    fn default() -> Self {
        TargetBlend {
            eval_weight: 0.0,
            eval_scale: 400.0,
        }
    }
}

impl TargetBlend {
    /// Training target for one sample.
    ///
    /// Infinite evaluations (decided games without a stored score) squash to 0 or 1.
    #[inline]
    #[must_use]
    pub fn target(&self, eval: f32, outcome: f32) -> f32 {
        let squashed = 1.0 / (1.0 + (-eval / self.eval_scale).exp());
        self.eval_weight * squashed + (1.0 - self.eval_weight) * outcome
    }
}

/// Layer widths of the network.
///
/// `hidden1` takes the concatenation of both perspectives, so its input
/// width is `2 * ft_out`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Architecture {
    pub feature_count: usize,
    pub ft_out: usize,
    pub hidden1: usize,
    pub hidden2: usize,
}

impl Default for Architecture {
    fn default() -> Self {
        Architecture {
            feature_count: FEATURE_COUNT,
            ft_out: 32,
            hidden1: 8,
            hidden2: 8,
        }
    }
}

impl Architecture {
    #[must_use]
    pub fn new(ft_out: usize, hidden1: usize, hidden2: usize) -> Self {
        Architecture {
            feature_count: FEATURE_COUNT,
            ft_out,
            hidden1,
            hidden2,
        }
    }

    /// Input width of the first hidden layer
    #[inline]
    #[must_use]
    pub fn hidden1_inputs(&self) -> usize {
        2 * self.ft_out
    }
}
