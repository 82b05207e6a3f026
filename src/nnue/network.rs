//! Float reference network.
//!
//! Mirrors the trained model exactly so that positions can be scored from a
//! checkpoint and the checkpoint can be quantized for the engine:
//! - Feature transformer applied to both perspectives, clamped to `[0, 1]`
//! - stm ‖ non-stm concatenation into two clamped hidden layers
//! - Single sigmoid output (win probability for the side to move)

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use super::checkpoint::{
    Checkpoint, CheckpointError, Tensor, FT_BIAS, FT_WEIGHT, HIDDEN1_BIAS, HIDDEN1_WEIGHT,
    HIDDEN2_BIAS, HIDDEN2_WEIGHT, OUT_BIAS, OUT_WEIGHT,
};
use super::feature::PositionFeatures;
use super::quantize::{quantize, LayerRole, QuantizeError, QuantizedTensor};
use super::weights::QuantizedNetwork;
use super::MAX_ACTIVE_FEATURES;
use crate::board::{FenError, Position};
use crate::config::Architecture;

/// Logit to pawn conversion used by the engine when reporting scores
pub const PAWN_FACTOR: f32 = 1.73;

/// Convert a win probability into an approximate pawn advantage.
#[inline]
#[must_use]
pub fn win_probability_to_pawns(probability: f32) -> f32 {
    (probability / (1.0 - probability)).ln() * PAWN_FACTOR
}

/// Fully connected layer, weights stored `[inputs, outputs]` row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Linear {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl Linear {
    #[must_use]
    pub fn zeros(inputs: usize, outputs: usize) -> Self {
        Linear {
            inputs,
            outputs,
            weights: vec![0.0; inputs * outputs],
            bias: vec![0.0; outputs],
        }
    }

    /// Uniform init in `±sqrt(6 / fan_in)`
    pub fn he_uniform<R: Rng + ?Sized>(
        inputs: usize,
        outputs: usize,
        fan_in: usize,
        rng: &mut R,
    ) -> Self {
        let bound = (6.0 / fan_in.max(1) as f32).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        let mut layer = Linear::zeros(inputs, outputs);
        for w in &mut layer.weights {
            *w = dist.sample(rng);
        }
        layer
    }

    fn from_checkpoint(
        checkpoint: &Checkpoint,
        weight_name: &str,
        bias_name: &str,
        inputs: usize,
        outputs: usize,
    ) -> Result<Self, CheckpointError> {
        let weights = checkpoint.tensor(weight_name, &[outputs, inputs])?;
        let bias = checkpoint.tensor(bias_name, &[outputs])?;
        let mut layer = Linear::zeros(inputs, outputs);
        for (o, row) in weights.data.chunks_exact(inputs.max(1)).enumerate() {
            for (i, &w) in row.iter().enumerate() {
                layer.weights[i * outputs + o] = w;
            }
        }
        layer.bias.copy_from_slice(&bias.data);
        Ok(layer)
    }

    #[inline]
    #[must_use]
    pub fn weight(&self, input: usize, output: usize) -> f32 {
        self.weights[input * self.outputs + output]
    }

    /// Dense forward pass into `output`
    pub fn forward(&self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), self.inputs);
        debug_assert_eq!(output.len(), self.outputs);
        output.copy_from_slice(&self.bias);
        for (row, &x) in self.weights.chunks_exact(self.outputs).zip(input) {
            if x == 0.0 {
                continue;
            }
            for (o, &w) in output.iter_mut().zip(row) {
                *o += x * w;
            }
        }
    }

    /// Forward pass over one-hot inputs given by their indices
    ///
    /// # Panics
    /// If a feature index is not below `inputs`.
    pub fn forward_sparse(&self, features: &[u32], output: &mut [f32]) {
        debug_assert_eq!(output.len(), self.outputs);
        output.copy_from_slice(&self.bias);
        for &feature in features {
            let feature = feature as usize;
            assert!(
                feature < self.inputs,
                "feature index {feature} out of range for {} inputs",
                self.inputs
            );
            let row = &self.weights[feature * self.outputs..(feature + 1) * self.outputs];
            for (o, &w) in output.iter_mut().zip(row) {
                *o += w;
            }
        }
    }

    /// Weights transposed to `[outputs, inputs]`, the engine's layout
    #[must_use]
    pub fn output_major(&self) -> Vec<f32> {
        let mut transposed = vec![0.0; self.weights.len()];
        for i in 0..self.inputs {
            for o in 0..self.outputs {
                transposed[o * self.inputs + i] = self.weights[i * self.outputs + o];
            }
        }
        transposed
    }

    fn clamp_weights(&mut self, bound: f32) {
        for w in &mut self.weights {
            *w = w.clamp(-bound, bound);
        }
    }

    fn quantize(
        &self,
        weight_role: LayerRole,
        bias_role: LayerRole,
    ) -> Result<(QuantizedTensor, QuantizedTensor), QuantizeError> {
        let weights = quantize(
            weight_role,
            &[self.outputs, self.inputs],
            &self.output_major(),
        )?;
        let bias = quantize(bias_role, &[self.outputs], &self.bias)?;
        Ok((weights, bias))
    }

    fn insert_into(&self, checkpoint: &mut Checkpoint, weight_name: &str, bias_name: &str) {
        checkpoint.insert(
            weight_name,
            Tensor {
                shape: vec![self.outputs, self.inputs],
                data: self.output_major(),
            },
        );
        checkpoint.insert(
            bias_name,
            Tensor {
                shape: vec![self.outputs],
                data: self.bias.clone(),
            },
        );
    }
}

#[inline]
fn clipped_relu(values: &mut [f32]) {
    for v in values {
        *v = v.clamp(0.0, 1.0);
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Float network weights
#[derive(Clone, Debug, PartialEq)]
pub struct FloatNetwork {
    pub architecture: Architecture,
    pub ft: Linear,
    pub hidden1: Linear,
    pub hidden2: Linear,
    pub output: Linear,
}

impl FloatNetwork {
    #[must_use]
    pub fn zeros(architecture: Architecture) -> Self {
        let a = architecture;
        FloatNetwork {
            architecture,
            ft: Linear::zeros(a.feature_count, a.ft_out),
            hidden1: Linear::zeros(a.hidden1_inputs(), a.hidden1),
            hidden2: Linear::zeros(a.hidden1, a.hidden2),
            output: Linear::zeros(a.hidden2, 1),
        }
    }

    /// Randomly initialised network, weights already within training clamps.
    pub fn he_uniform<R: Rng + ?Sized>(architecture: Architecture, rng: &mut R) -> Self {
        let a = architecture;
        let mut network = FloatNetwork {
            architecture,
            // fan-in of the transformer is the number of active pieces, not its width
            ft: Linear::he_uniform(a.feature_count, a.ft_out, MAX_ACTIVE_FEATURES, rng),
            hidden1: Linear::he_uniform(a.hidden1_inputs(), a.hidden1, a.hidden1_inputs(), rng),
            hidden2: Linear::he_uniform(a.hidden1, a.hidden2, a.hidden1, rng),
            output: Linear::he_uniform(a.hidden2, 1, a.hidden2 + 1, rng),
        };
        network.clip_weights();
        network
    }

    /// Load every layer from a checkpoint, checking shapes against `architecture`.
    pub fn from_checkpoint(
        checkpoint: &Checkpoint,
        architecture: Architecture,
    ) -> Result<Self, CheckpointError> {
        let a = architecture;
        Ok(FloatNetwork {
            architecture,
            ft: Linear::from_checkpoint(checkpoint, FT_WEIGHT, FT_BIAS, a.feature_count, a.ft_out)?,
            hidden1: Linear::from_checkpoint(
                checkpoint,
                HIDDEN1_WEIGHT,
                HIDDEN1_BIAS,
                a.hidden1_inputs(),
                a.hidden1,
            )?,
            hidden2: Linear::from_checkpoint(
                checkpoint,
                HIDDEN2_WEIGHT,
                HIDDEN2_BIAS,
                a.hidden1,
                a.hidden2,
            )?,
            output: Linear::from_checkpoint(checkpoint, OUT_WEIGHT, OUT_BIAS, a.hidden2, 1)?,
        })
    }

    #[must_use]
    pub fn to_checkpoint(&self) -> Checkpoint {
        let mut checkpoint = Checkpoint::new();
        self.ft.insert_into(&mut checkpoint, FT_WEIGHT, FT_BIAS);
        self.hidden1
            .insert_into(&mut checkpoint, HIDDEN1_WEIGHT, HIDDEN1_BIAS);
        self.hidden2
            .insert_into(&mut checkpoint, HIDDEN2_WEIGHT, HIDDEN2_BIAS);
        self.output.insert_into(&mut checkpoint, OUT_WEIGHT, OUT_BIAS);
        checkpoint
    }

    /// Win probability for the side to move
    #[must_use]
    pub fn forward(&self, features: &PositionFeatures) -> f32 {
        let ft_out = self.architecture.ft_out;
        let mut accumulator = vec![0.0; 2 * ft_out];
        let (stm, non_stm) = accumulator.split_at_mut(ft_out);
        self.ft.forward_sparse(&features.stm, stm);
        self.ft.forward_sparse(&features.non_stm, non_stm);
        clipped_relu(&mut accumulator);

        let mut h1 = vec![0.0; self.hidden1.outputs];
        self.hidden1.forward(&accumulator, &mut h1);
        clipped_relu(&mut h1);

        let mut h2 = vec![0.0; self.hidden2.outputs];
        self.hidden2.forward(&h1, &mut h2);
        clipped_relu(&mut h2);

        let mut out = [0.0];
        self.output.forward(&h2, &mut out);
        sigmoid(out[0])
    }

    #[must_use]
    pub fn evaluate(&self, position: &Position) -> f32 {
        self.forward(&PositionFeatures::new(position))
    }

    /// Win probability for the side to move in a FEN position
    pub fn score_position(&self, fen: &str) -> Result<f32, FenError> {
        let position = Position::try_from_fen(fen)?;
        Ok(self.evaluate(&position))
    }

    /// Clamp hidden and output weights to their quantization range.
    ///
    /// Run after every optimizer step so that export never saturates.
    pub fn clip_weights(&mut self) {
        let hidden = LayerRole::HiddenWeight.clamp_bound().unwrap_or(f64::INFINITY) as f32;
        let output = LayerRole::OutputWeight.clamp_bound().unwrap_or(f64::INFINITY) as f32;
        self.hidden1.clamp_weights(hidden);
        self.hidden2.clamp_weights(hidden);
        self.output.clamp_weights(output);
    }

    /// Convert every layer to the engine's fixed-point format
    pub fn quantize(&self) -> Result<QuantizedNetwork, QuantizeError> {
        let (ft_weight, ft_bias) = self.ft.quantize(LayerRole::InputWeight, LayerRole::InputBias)?;
        let (hidden1_weight, hidden1_bias) = self
            .hidden1
            .quantize(LayerRole::HiddenWeight, LayerRole::HiddenBias)?;
        let (hidden2_weight, hidden2_bias) = self
            .hidden2
            .quantize(LayerRole::HiddenWeight, LayerRole::HiddenBias)?;
        let (output_weight, output_bias) = self
            .output
            .quantize(LayerRole::OutputWeight, LayerRole::OutputBias)?;

        Ok(QuantizedNetwork {
            architecture: self.architecture,
            ft_weight,
            ft_bias,
            hidden1_weight,
            hidden1_bias,
            hidden2_weight,
            hidden2_bias,
            output_weight,
            output_bias,
        })
    }
}
