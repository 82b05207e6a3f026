//! Float to fixed-point conversion for the engine's integer inference.
//!
//! Each layer role has a scale and an integer width matching the engine's
//! arithmetic. Hidden and output weights are clamped before scaling (the same
//! clamp training applies after every optimizer step), so they can never
//! overflow their width. Values are rounded half to even.

use std::fmt;
use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::{ACTIVATION_RANGE, OUTPUT_SCALING, OUTPUT_WEIGHT_SCALING, WEIGHT_SCALING};

/// Integer element width of a quantized tensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
}

impl IntWidth {
    /// Bytes per element in the weight file
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            IntWidth::I8 => 1,
            IntWidth::I16 => 2,
            IntWidth::I32 => 4,
        }
    }

    #[must_use]
    pub const fn min_value(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MIN as i64,
            IntWidth::I16 => i16::MIN as i64,
            IntWidth::I32 => i32::MIN as i64,
        }
    }

    #[must_use]
    pub const fn max_value(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MAX as i64,
            IntWidth::I16 => i16::MAX as i64,
            IntWidth::I32 => i32::MAX as i64,
        }
    }
}

/// Role of a tensor in the network; determines scale, clamp and width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerRole {
    /// Feature transformer weights
    InputWeight,
    /// Feature transformer biases
    InputBias,
    HiddenWeight,
    HiddenBias,
    OutputWeight,
    OutputBias,
}

impl LayerRole {
    pub const ALL: [LayerRole; 6] = [
        LayerRole::InputWeight,
        LayerRole::InputBias,
        LayerRole::HiddenWeight,
        LayerRole::HiddenBias,
        LayerRole::OutputWeight,
        LayerRole::OutputBias,
    ];

    /// Multiplier from float to fixed point
    #[must_use]
    pub fn scale(self) -> f64 {
        let activation = f64::from(ACTIVATION_RANGE);
        let output = f64::from(OUTPUT_WEIGHT_SCALING) * f64::from(OUTPUT_SCALING);
        match self {
            LayerRole::InputWeight | LayerRole::InputBias => activation,
            LayerRole::HiddenWeight => f64::from(WEIGHT_SCALING),
            LayerRole::HiddenBias => f64::from(WEIGHT_SCALING) * activation,
            LayerRole::OutputWeight => output / activation,
            LayerRole::OutputBias => output,
        }
    }

    /// Symmetric bound applied before scaling, if any.
    ///
    /// Chosen so that `bound * scale == ACTIVATION_RANGE`, the largest i8 the
    /// engine multiplies with.
    #[must_use]
    pub fn clamp_bound(self) -> Option<f64> {
        let activation = f64::from(ACTIVATION_RANGE);
        match self {
            LayerRole::HiddenWeight => Some(activation / f64::from(WEIGHT_SCALING)),
            LayerRole::OutputWeight => Some(
                activation * activation
                    / (f64::from(OUTPUT_WEIGHT_SCALING) * f64::from(OUTPUT_SCALING)),
            ),
            _ => None,
        }
    }

    #[must_use]
    pub const fn width(self) -> IntWidth {
        match self {
            LayerRole::InputWeight | LayerRole::InputBias => IntWidth::I16,
            LayerRole::HiddenWeight | LayerRole::OutputWeight => IntWidth::I8,
            LayerRole::HiddenBias | LayerRole::OutputBias => IntWidth::I32,
        }
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerRole::InputWeight => "input weight",
            LayerRole::InputBias => "input bias",
            LayerRole::HiddenWeight => "hidden weight",
            LayerRole::HiddenBias => "hidden bias",
            LayerRole::OutputWeight => "output weight",
            LayerRole::OutputBias => "output bias",
        };
        f.write_str(name)
    }
}

/// Error type for quantization failures
#[derive(Debug, Clone, PartialEq)]
pub enum QuantizeError {
    /// NaN or infinite parameter
    NonFinite { role: LayerRole, index: usize },
    /// Scaled value does not fit the role's integer width
    Overflow {
        role: LayerRole,
        index: usize,
        value: f32,
    },
    /// Shape does not describe the number of values given
    ShapeMismatch { expected: usize, found: usize },
}

impl fmt::Display for QuantizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantizeError::NonFinite { role, index } => {
                write!(f, "Non-finite {role} at index {index}")
            }
            QuantizeError::Overflow { role, index, value } => write!(
                f,
                "{role} {value} at index {index} does not fit {:?} after scaling by {}",
                role.width(),
                role.scale()
            ),
            QuantizeError::ShapeMismatch { expected, found } => {
                write!(f, "Shape describes {expected} values, found {found}")
            }
        }
    }
}

impl std::error::Error for QuantizeError {}

/// Quantize one value: clamp, scale, round half to even.
///
/// `index` is only used for error reporting.
pub fn quantize_value(role: LayerRole, value: f32, index: usize) -> Result<i64, QuantizeError> {
    if !value.is_finite() {
        return Err(QuantizeError::NonFinite { role, index });
    }
    let mut v = f64::from(value);
    if let Some(bound) = role.clamp_bound() {
        v = v.clamp(-bound, bound);
    }
    let q = (v * role.scale()).round_ties_even();

    let width = role.width();
    if q < width.min_value() as f64 || q > width.max_value() as f64 {
        return Err(QuantizeError::Overflow { role, index, value });
    }
    Ok(q as i64)
}

/// Map a quantized value back to float
#[inline]
#[must_use]
pub fn dequantize(role: LayerRole, q: i64) -> f64 {
    q as f64 / role.scale()
}

/// Typed storage behind a [`QuantizedTensor`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuantizedValues {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl QuantizedValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            QuantizedValues::I8(v) => v.len(),
            QuantizedValues::I16(v) => v.len(),
            QuantizedValues::I32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn width(&self) -> IntWidth {
        match self {
            QuantizedValues::I8(_) => IntWidth::I8,
            QuantizedValues::I16(_) => IntWidth::I16,
            QuantizedValues::I32(_) => IntWidth::I32,
        }
    }

    /// Element widened to i64
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        match self {
            QuantizedValues::I8(v) => v.get(index).map(|&x| i64::from(x)),
            QuantizedValues::I16(v) => v.get(index).map(|&x| i64::from(x)),
            QuantizedValues::I32(v) => v.get(index).map(|&x| i64::from(x)),
        }
    }
}

/// Integer tensor with the role that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedTensor {
    role: LayerRole,
    shape: Vec<usize>,
    values: QuantizedValues,
}

impl QuantizedTensor {
    /// Wrap already-quantized values, checking width and shape
    pub fn from_values(
        role: LayerRole,
        shape: &[usize],
        values: QuantizedValues,
    ) -> Result<Self, QuantizeError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() || values.width() != role.width() {
            return Err(QuantizeError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(QuantizedTensor {
            role,
            shape: shape.to_vec(),
            values,
        })
    }

    #[inline]
    #[must_use]
    pub fn role(&self) -> LayerRole {
        self.role
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &QuantizedValues {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Size of the little-endian payload
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.len() * self.role.width().bytes()
    }

    /// Float approximation of every element
    #[must_use]
    pub fn dequantized(&self) -> Vec<f64> {
        (0..self.len())
            .filter_map(|i| self.values.get(i))
            .map(|q| dequantize(self.role, q))
            .collect()
    }

    /// Write the elements little-endian with no framing
    pub fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match &self.values {
            QuantizedValues::I8(v) => {
                for &x in v {
                    writer.write_i8(x)?;
                }
            }
            QuantizedValues::I16(v) => {
                for &x in v {
                    writer.write_i16::<LittleEndian>(x)?;
                }
            }
            QuantizedValues::I32(v) => {
                for &x in v {
                    writer.write_i32::<LittleEndian>(x)?;
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        // Writing into a Vec cannot fail
        let _ = self.write_le(&mut bytes);
        bytes
    }
}

/// Quantize a float tensor for `role`.
///
/// `shape` must describe exactly `values.len()` elements.
pub fn quantize(
    role: LayerRole,
    shape: &[usize],
    values: &[f32],
) -> Result<QuantizedTensor, QuantizeError> {
    let expected: usize = shape.iter().product();
    if expected != values.len() {
        return Err(QuantizeError::ShapeMismatch {
            expected,
            found: values.len(),
        });
    }

    // quantize_value has already range-checked against the width
    let quantized = values
        .iter()
        .enumerate()
        .map(|(i, &v)| quantize_value(role, v, i));
    let values = match role.width() {
        IntWidth::I8 => QuantizedValues::I8(
            quantized
                .map(|q| q.map(|q| q as i8))
                .collect::<Result<_, _>>()?,
        ),
        IntWidth::I16 => QuantizedValues::I16(
            quantized
                .map(|q| q.map(|q| q as i16))
                .collect::<Result<_, _>>()?,
        ),
        IntWidth::I32 => QuantizedValues::I32(
            quantized
                .map(|q| q.map(|q| q as i32))
                .collect::<Result<_, _>>()?,
        ),
    };

    Ok(QuantizedTensor {
        role,
        shape: shape.to_vec(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_scales() {
        assert_eq!(LayerRole::InputWeight.scale(), 127.0);
        assert_eq!(LayerRole::InputBias.scale(), 127.0);
        assert_eq!(LayerRole::HiddenWeight.scale(), 64.0);
        assert_eq!(LayerRole::HiddenBias.scale(), 8128.0);
        assert!((LayerRole::OutputWeight.scale() - 9600.0 / 127.0).abs() < 1e-12);
        assert_eq!(LayerRole::OutputBias.scale(), 9600.0);
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(LayerRole::HiddenWeight.clamp_bound(), Some(1.984375));
        let out = LayerRole::OutputWeight.clamp_bound().unwrap();
        assert!((out - 16129.0 / 9600.0).abs() < 1e-12);
        assert_eq!(LayerRole::InputWeight.clamp_bound(), None);
        assert_eq!(LayerRole::OutputBias.clamp_bound(), None);
    }

    #[test]
    fn clamped_roles_saturate_at_activation_range() {
        assert_eq!(quantize_value(LayerRole::HiddenWeight, 100.0, 0), Ok(127));
        assert_eq!(quantize_value(LayerRole::HiddenWeight, -100.0, 0), Ok(-127));
        assert_eq!(quantize_value(LayerRole::OutputWeight, 5.0, 0), Ok(127));
        assert_eq!(quantize_value(LayerRole::OutputWeight, -5.0, 0), Ok(-127));
    }

    #[test]
    fn rounds_half_to_even() {
        // 0.5 / 64 and 1.5 / 64 are exact in binary
        assert_eq!(quantize_value(LayerRole::HiddenWeight, 0.5 / 64.0, 0), Ok(0));
        assert_eq!(quantize_value(LayerRole::HiddenWeight, 1.5 / 64.0, 0), Ok(2));
        assert_eq!(quantize_value(LayerRole::HiddenWeight, -2.5 / 64.0, 0), Ok(-2));
        assert_eq!(quantize_value(LayerRole::HiddenWeight, 0.25, 0), Ok(16));
    }

    #[test]
    fn unclamped_overflow_is_reported() {
        // 300 * 127 = 38100 > i16::MAX
        assert_eq!(
            quantize_value(LayerRole::InputWeight, 300.0, 7),
            Err(QuantizeError::Overflow {
                role: LayerRole::InputWeight,
                index: 7,
                value: 300.0
            })
        );
        assert_eq!(quantize_value(LayerRole::InputWeight, 250.0, 0), Ok(31750));
    }

    #[test]
    fn non_finite_is_reported() {
        assert_eq!(
            quantize_value(LayerRole::HiddenWeight, f32::NAN, 3),
            Err(QuantizeError::NonFinite {
                role: LayerRole::HiddenWeight,
                index: 3
            })
        );
        assert!(quantize(LayerRole::OutputBias, &[2], &[0.0, f32::INFINITY]).is_err());
    }

    #[test]
    fn tensor_widths_and_bytes() {
        let t = quantize(LayerRole::InputBias, &[3], &[0.0, 1.0, -1.0]).unwrap();
        assert_eq!(t.values(), &QuantizedValues::I16(vec![0, 127, -127]));
        assert_eq!(t.to_le_bytes(), vec![0, 0, 127, 0, 0x81, 0xff]);

        let t = quantize(LayerRole::OutputBias, &[1], &[0.5]).unwrap();
        assert_eq!(t.values(), &QuantizedValues::I32(vec![4800]));
        assert_eq!(t.to_le_bytes(), 4800i32.to_le_bytes().to_vec());

        let t = quantize(LayerRole::HiddenWeight, &[2, 2], &[0.0, 1.0, -1.0, 0.5]).unwrap();
        assert_eq!(t.values(), &QuantizedValues::I8(vec![0, 64, -64, 32]));
        assert_eq!(t.byte_len(), 4);
    }

    #[test]
    fn shape_mismatch() {
        assert_eq!(
            quantize(LayerRole::InputBias, &[2, 2], &[0.0; 3]),
            Err(QuantizeError::ShapeMismatch {
                expected: 4,
                found: 3
            })
        );
        assert!(QuantizedTensor::from_values(
            LayerRole::InputBias,
            &[2],
            QuantizedValues::I8(vec![0, 0])
        )
        .is_err());
    }

    #[test]
    fn dequantize_inverts_scale() {
        assert_eq!(dequantize(LayerRole::HiddenWeight, 32), 0.5);
        assert_eq!(dequantize(LayerRole::OutputBias, 9600), 1.0);
        let t = quantize(LayerRole::InputWeight, &[2], &[1.0, -0.3]).unwrap();
        assert_eq!(t.values(), &QuantizedValues::I16(vec![127, -38]));
        let back = t.dequantized();
        assert!((back[0] - 1.0).abs() < 1e-12);
        assert!((back[1] + 0.3).abs() < 0.5 / 127.0);
    }
}
