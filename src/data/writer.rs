//! Writing packed-sample datasets.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::sample::Sample;

/// Appends packed records to a byte sink.
///
/// Samples that cannot be packed are rejected with `InvalidInput` and nothing
/// is written for them.
pub struct SampleWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> SampleWriter<W> {
    pub fn new(writer: W) -> Self {
        SampleWriter { writer, written: 0 }
    }

    pub fn write(&mut self, sample: &Sample) -> io::Result<()> {
        let packed = sample
            .pack()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        self.writer.write_all(&packed.to_bytes())?;
        self.written += 1;
        Ok(())
    }

    /// Records written so far
    #[inline]
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the sink
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write `samples` to a new file at `path`, returning the record count
pub fn write_samples<P: AsRef<Path>>(path: P, samples: &[Sample]) -> io::Result<u64> {
    let path = path.as_ref();
    let mut writer = SampleWriter::new(BufWriter::new(File::create(path)?));
    for sample in samples {
        writer.write(sample)?;
    }
    let written = writer.written();
    writer.into_inner()?;
    log::info!("wrote {written} samples to {}", path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use crate::data::sample::{Outcome, PackedSample, PACKED_SAMPLE_SIZE};

    #[test]
    fn writes_fixed_size_records() {
        let sample = Sample::new(Position::startpos(), Outcome::BlackWins, Some(-40));
        let mut writer = SampleWriter::new(Vec::new());
        writer.write(&sample).unwrap();
        writer.write(&sample).unwrap();
        assert_eq!(writer.written(), 2);

        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes.len(), 2 * PACKED_SAMPLE_SIZE);
        let mut record = [0u8; PACKED_SAMPLE_SIZE];
        record.copy_from_slice(&bytes[PACKED_SAMPLE_SIZE..]);
        assert_eq!(PackedSample::from_bytes(&record).unpack().unwrap(), sample);
    }

    #[test]
    fn rejects_unpackable_sample() {
        let sample = Sample::new(Position::startpos(), Outcome::Draw, Some(i16::MIN));
        let mut writer = SampleWriter::new(Vec::new());
        let err = writer.write(&sample).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(writer.written(), 0);
        assert!(writer.into_inner().unwrap().is_empty());
    }
}
