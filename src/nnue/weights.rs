//! Engine weight file.
//!
//! The file is the raw concatenation of eight little-endian payloads with no
//! header, length prefix or checksum:
//!
//! | Payload | Element | Count |
//! |---|---|---|
//! | ft weight | i16 | `ft_out * feature_count` |
//! | ft bias | i16 | `ft_out` |
//! | hidden1 weight | i8 | `hidden1 * 2 * ft_out` |
//! | hidden1 bias | i32 | `hidden1` |
//! | hidden2 weight | i8 | `hidden2 * hidden1` |
//! | hidden2 bias | i32 | `hidden2` |
//! | output weight | i8 | `hidden2` |
//! | output bias | i32 | 1 |
//!
//! Weight matrices are output-major: consecutive values are one output
//! neuron's weights across all of its inputs.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::quantize::{IntWidth, LayerRole, QuantizedTensor, QuantizedValues};
use crate::config::Architecture;

/// Quantized network in weight-file order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedNetwork {
    pub architecture: Architecture,
    pub ft_weight: QuantizedTensor,
    pub ft_bias: QuantizedTensor,
    pub hidden1_weight: QuantizedTensor,
    pub hidden1_bias: QuantizedTensor,
    pub hidden2_weight: QuantizedTensor,
    pub hidden2_bias: QuantizedTensor,
    pub output_weight: QuantizedTensor,
    pub output_bias: QuantizedTensor,
}

/// `(role, shape)` of each payload, in file order
fn layout(a: &Architecture) -> [(LayerRole, [usize; 2]); 8] {
    [
        (LayerRole::InputWeight, [a.ft_out, a.feature_count]),
        (LayerRole::InputBias, [a.ft_out, 1]),
        (LayerRole::HiddenWeight, [a.hidden1, a.hidden1_inputs()]),
        (LayerRole::HiddenBias, [a.hidden1, 1]),
        (LayerRole::HiddenWeight, [a.hidden2, a.hidden1]),
        (LayerRole::HiddenBias, [a.hidden2, 1]),
        (LayerRole::OutputWeight, [1, a.hidden2]),
        (LayerRole::OutputBias, [1, 1]),
    ]
}

/// Exact byte length of a weight file for `architecture`
#[must_use]
pub fn weight_file_len(architecture: &Architecture) -> u64 {
    layout(architecture)
        .iter()
        .map(|(role, [rows, cols])| (rows * cols * role.width().bytes()) as u64)
        .sum()
}

impl QuantizedNetwork {
    /// Payloads in file order
    #[must_use]
    pub fn tensors(&self) -> [&QuantizedTensor; 8] {
        [
            &self.ft_weight,
            &self.ft_bias,
            &self.hidden1_weight,
            &self.hidden1_bias,
            &self.hidden2_weight,
            &self.hidden2_bias,
            &self.output_weight,
            &self.output_bias,
        ]
    }

    /// Write the weight file, returning the number of bytes written
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        let mut written = 0u64;
        for tensor in self.tensors() {
            tensor.write_le(writer)?;
            written += tensor.byte_len() as u64;
        }
        Ok(written)
    }

    /// Write the weight file to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<u64> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.write_to(&mut writer)?;
        writer.flush()?;
        log::info!("wrote {written} bytes of weights to {}", path.display());
        Ok(written)
    }

    /// Parse a weight file produced for `architecture`.
    ///
    /// Fails with `UnexpectedEof` on a short file and `InvalidData` on trailing bytes.
    pub fn read_from<R: Read>(reader: &mut R, architecture: Architecture) -> io::Result<Self> {
        let mut tensors = Vec::with_capacity(8);
        for (role, [rows, cols]) in layout(&architecture) {
            let len = rows * cols;
            let values = match role.width() {
                IntWidth::I8 => {
                    let mut buf = vec![0i8; len];
                    reader.read_i8_into(&mut buf)?;
                    QuantizedValues::I8(buf)
                }
                IntWidth::I16 => {
                    let mut buf = vec![0i16; len];
                    reader.read_i16_into::<LittleEndian>(&mut buf)?;
                    QuantizedValues::I16(buf)
                }
                IntWidth::I32 => {
                    let mut buf = vec![0i32; len];
                    reader.read_i32_into::<LittleEndian>(&mut buf)?;
                    QuantizedValues::I32(buf)
                }
            };
            let is_bias = matches!(
                role,
                LayerRole::InputBias | LayerRole::HiddenBias | LayerRole::OutputBias
            );
            let shape: &[usize] = if is_bias { &[rows] } else { &[rows, cols] };
            let tensor = QuantizedTensor::from_values(role, shape, values)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            tensors.push(tensor);
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "weight file is longer than the architecture allows",
            ));
        }

        let mut tensors = tensors.into_iter();
        let mut next = || {
            tensors
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing payload"))
        };
        Ok(QuantizedNetwork {
            architecture,
            ft_weight: next()?,
            ft_bias: next()?,
            hidden1_weight: next()?,
            hidden1_bias: next()?,
            hidden2_weight: next()?,
            hidden2_bias: next()?,
            output_weight: next()?,
            output_bias: next()?,
        })
    }

    /// Load a weight file from `path`
    pub fn load<P: AsRef<Path>>(path: P, architecture: Architecture) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, architecture)
    }
}
