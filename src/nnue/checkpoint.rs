//! Named float tensors handed over by the training loop.
//!
//! Names and layout follow a PyTorch `state_dict`: weights are
//! `[outputs, inputs]` row-major as in `nn.Linear`, biases `[outputs]`.
//! With the `serde` feature a checkpoint reads from and writes to JSON of the
//! form `{"tensors": {"ft.weight": {"shape": [32, 768], "data": [...]}, ...}}`.

use std::collections::BTreeMap;
use std::fmt;
use std::io;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const FT_WEIGHT: &str = "ft.weight";
pub const FT_BIAS: &str = "ft.bias";
pub const HIDDEN1_WEIGHT: &str = "hidden1.weight";
pub const HIDDEN1_BIAS: &str = "hidden1.bias";
pub const HIDDEN2_WEIGHT: &str = "hidden2.weight";
pub const HIDDEN2_BIAS: &str = "hidden2.bias";
pub const OUT_WEIGHT: &str = "out.weight";
pub const OUT_BIAS: &str = "out.bias";

/// Error type for checkpoint loading failures
#[derive(Debug)]
pub enum CheckpointError {
    /// Required layer not present
    MissingTensor { name: String },
    /// Layer present with an unexpected shape
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// Data length disagrees with the declared shape
    DataLength {
        name: String,
        expected: usize,
        found: usize,
    },
    Io(io::Error),
    #[cfg(feature = "serde")]
    Json(serde_json::Error),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::MissingTensor { name } => {
                write!(f, "Checkpoint has no tensor '{name}'")
            }
            CheckpointError::ShapeMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "Tensor '{name}' has shape {found:?}, expected {expected:?}"
            ),
            CheckpointError::DataLength {
                name,
                expected,
                found,
            } => write!(
                f,
                "Tensor '{name}' declares {expected} values but holds {found}"
            ),
            CheckpointError::Io(err) => write!(f, "Checkpoint I/O error: {err}"),
            #[cfg(feature = "serde")]
            CheckpointError::Json(err) => write!(f, "Malformed checkpoint JSON: {err}"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(err) => Some(err),
            #[cfg(feature = "serde")]
            CheckpointError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(err: io::Error) -> Self {
        CheckpointError::Io(err)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Json(err)
    }
}

/// Dense row-major float tensor
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    /// Zero-filled tensor of the given shape
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    #[inline]
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Layer name to tensor mapping
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Checkpoint {
    pub tensors: BTreeMap<String, Tensor>,
}

impl Checkpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, tensor: Tensor) {
        self.tensors.insert(name.to_string(), tensor);
    }

    /// Fetch a tensor, checking its shape and data length
    pub fn tensor(&self, name: &str, shape: &[usize]) -> Result<&Tensor, CheckpointError> {
        let tensor = self
            .tensors
            .get(name)
            .ok_or_else(|| CheckpointError::MissingTensor {
                name: name.to_string(),
            })?;
        if tensor.shape != shape {
            return Err(CheckpointError::ShapeMismatch {
                name: name.to_string(),
                expected: shape.to_vec(),
                found: tensor.shape.clone(),
            });
        }
        if tensor.data.len() != tensor.numel() {
            return Err(CheckpointError::DataLength {
                name: name.to_string(),
                expected: tensor.numel(),
                found: tensor.data.len(),
            });
        }
        Ok(tensor)
    }
}

#[cfg(feature = "serde")]
impl Checkpoint {
    pub fn from_json_reader<R: io::Read>(reader: R) -> Result<Self, CheckpointError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CheckpointError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON checkpoint from disk
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, CheckpointError> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(io::BufReader::new(file))
    }

    pub fn to_json_writer<W: io::Write>(&self, writer: W) -> Result<(), CheckpointError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_lookup_checks_shape() {
        let mut ckpt = Checkpoint::new();
        ckpt.insert(OUT_BIAS, Tensor::zeros(&[1]));
        ckpt.insert(
            OUT_WEIGHT,
            Tensor {
                shape: vec![1, 8],
                data: vec![0.0; 7],
            },
        );

        assert!(ckpt.tensor(OUT_BIAS, &[1]).is_ok());
        assert!(matches!(
            ckpt.tensor(OUT_BIAS, &[2]),
            Err(CheckpointError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            ckpt.tensor(OUT_WEIGHT, &[1, 8]),
            Err(CheckpointError::DataLength {
                expected: 8,
                found: 7,
                ..
            })
        ));
        assert!(matches!(
            ckpt.tensor(FT_WEIGHT, &[32, 768]),
            Err(CheckpointError::MissingTensor { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_format() {
        let json = r#"{"tensors": {"out.bias": {"shape": [1], "data": [0.25]}}}"#;
        let ckpt = Checkpoint::from_json_str(json).unwrap();
        assert_eq!(ckpt.tensor(OUT_BIAS, &[1]).unwrap().data, vec![0.25]);

        let mut buf = Vec::new();
        ckpt.to_json_writer(&mut buf).unwrap();
        let reparsed = Checkpoint::from_json_reader(buf.as_slice()).unwrap();
        assert_eq!(reparsed, ckpt);

        assert!(matches!(
            Checkpoint::from_json_str("{\"tensors\": 3}"),
            Err(CheckpointError::Json(_))
        ));
    }
}
