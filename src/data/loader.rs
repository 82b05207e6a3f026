//! Batch producer over a packed-sample file.
//!
//! Lifecycle: `open` → `load`* → (`WrappedToNewEpoch`) → `reopen` or `close`.
//!
//! Records are read through an in-memory shuffle buffer; each refill is
//! shuffled before samples are handed out. Records that fail to decode are
//! skipped with a warning. An epoch ends with exactly one
//! [`EpochStatus::WrappedToNewEpoch`]; loading again before [`BatchLoader::reopen`]
//! is a contract violation.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::batch::Batch;
use super::error::{DataError, Violation};
use super::sample::{PackedSample, PACKED_SAMPLE_SIZE};
use crate::config::LoaderConfig;

/// Result of a successful load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochStatus {
    /// The buffer holds a fresh batch
    Continuing,
    /// The previous load delivered the last batch; the buffer is empty
    WrappedToNewEpoch,
}

/// Open file plus its shuffle buffer
struct SampleSource {
    reader: BufReader<File>,
    buffer: Vec<PackedSample>,
    buffer_limit: usize,
    rng: StdRng,
    exhausted: bool,
}

impl SampleSource {
    fn next_record(&mut self) -> io::Result<Option<PackedSample>> {
        if self.buffer.is_empty() && !self.fill_buffer()? {
            return Ok(None);
        }
        Ok(self.buffer.pop())
    }

    fn fill_buffer(&mut self) -> io::Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let mut record = [0u8; PACKED_SAMPLE_SIZE];
        while self.buffer.len() < self.buffer_limit {
            match self.reader.read_exact(&mut record) {
                Ok(()) => self.buffer.push(PackedSample::from_bytes(&record)),
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        self.buffer.shuffle(&mut self.rng);
        Ok(!self.buffer.is_empty())
    }
}

/// Reference batch producer.
///
/// Fills caller-owned [`Batch`]es; never keeps a reference to one between calls.
pub struct BatchLoader {
    path: PathBuf,
    config: LoaderConfig,
    source: Option<SampleSource>,
    records: u64,
    epoch: u64,
    wrapped: bool,
    skipped: u64,
    last_error: u32,
}

impl BatchLoader {
    /// Open a packed-sample file.
    ///
    /// Fails with [`DataError::SourceUnavailable`] if the file cannot be opened
    /// or its length is not a whole number of records.
    pub fn open<P: AsRef<Path>>(path: P, config: &LoaderConfig) -> Result<Self, DataError> {
        let path = path.as_ref().to_path_buf();
        let mut loader = BatchLoader {
            path,
            config: config.clone(),
            source: None,
            records: 0,
            epoch: 0,
            wrapped: false,
            skipped: 0,
            last_error: 0,
        };
        loader.open_source()?;
        log::info!(
            "opened {} ({} samples, batch size {})",
            loader.path.display(),
            loader.records,
            loader.config.batch_size
        );
        Ok(loader)
    }

    fn open_source(&mut self) -> Result<(), DataError> {
        let unavailable = |reason: String| DataError::SourceUnavailable {
            path: self.path.clone(),
            reason,
        };

        let file = File::open(&self.path).map_err(|err| unavailable(err.to_string()))?;
        let len = file
            .metadata()
            .map_err(|err| unavailable(err.to_string()))?
            .len();
        if len % PACKED_SAMPLE_SIZE as u64 != 0 {
            return Err(unavailable(format!(
                "length {len} is not a multiple of the {PACKED_SAMPLE_SIZE}-byte record"
            )));
        }

        let records = len / PACKED_SAMPLE_SIZE as u64;
        let buffer_limit = self
            .config
            .shuffle_buffer_samples
            .max(1)
            .min(usize::try_from(records).unwrap_or(usize::MAX).max(1));
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.epoch)),
            None => StdRng::from_entropy(),
        };

        self.records = records;
        self.source = Some(SampleSource {
            reader: BufReader::new(file),
            buffer: Vec::with_capacity(buffer_limit),
            buffer_limit,
            rng,
            exhausted: false,
        });
        self.wrapped = false;
        Ok(())
    }

    /// Overwrite `batch` with the next batch of the epoch.
    ///
    /// At most `min(batch_size, capacity)` samples are loaded; a `batch_size`
    /// of 0 means "the batch's capacity". On error `batch` is left empty and
    /// the error's code is kept for [`BatchLoader::last_error`].
    pub fn load(&mut self, batch: &mut Batch) -> Result<EpochStatus, DataError> {
        let result = self.fill(batch);
        self.last_error = match &result {
            Ok(_) => 0,
            Err(err) => {
                batch.clear();
                err.code()
            }
        };
        result
    }

    fn fill(&mut self, batch: &mut Batch) -> Result<EpochStatus, DataError> {
        let source = self.source.as_mut().ok_or(Violation::LoaderClosed)?;
        if self.wrapped {
            return Err(Violation::LoadAfterEpochWrap.into());
        }

        batch.clear();
        let limit = match self.config.batch_size {
            0 => batch.capacity(),
            n => n.min(batch.capacity()),
        };
        while batch.size() < limit {
            let Some(record) = source.next_record()? else {
                break;
            };
            match record.unpack() {
                Ok(sample) => batch.push(&sample)?,
                Err(err) => {
                    self.skipped += 1;
                    log::warn!("skipping undecodable sample: {err}");
                }
            }
        }

        if batch.is_empty() {
            self.wrapped = true;
            log::debug!(
                "epoch {} of {} finished",
                self.epoch,
                self.path.display()
            );
            return Ok(EpochStatus::WrappedToNewEpoch);
        }
        Ok(EpochStatus::Continuing)
    }

    /// Close and open the same file again, starting a new epoch
    pub fn reopen(&mut self) -> Result<(), DataError> {
        self.source = None;
        self.epoch += 1;
        self.last_error = 0;
        self.open_source()?;
        log::info!("reopened {} for epoch {}", self.path.display(), self.epoch);
        Ok(())
    }

    /// Release the file. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::debug!("closed {}", self.path.display());
        }
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// True once the current epoch has delivered its final batch
    #[inline]
    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Records in the file, decodable or not
    #[inline]
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Epochs started since `open`, counting from 0
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Undecodable records skipped so far
    #[inline]
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// [`DataError::code`] of the most recent failed load, 0 if it succeeded
    #[inline]
    #[must_use]
    pub fn last_error(&self) -> u32 {
        self.last_error
    }

    /// Record a failure detected outside `load`, such as a null buffer
    pub(crate) fn record_error(&mut self, err: &DataError) {
        self.last_error = err.code();
    }

    /// Batch size for buffers the producer allocates itself
    pub(crate) fn owned_batch_capacity(&self) -> Result<u32, DataError> {
        match self.config.batch_size {
            0 => Err(Violation::ZeroBatchSize.into()),
            n => Ok(n),
        }
    }
}

/// Consumer over a single long-lived batch.
///
/// `next_batch` yields the batches of one epoch, then `None` once, and
/// rotates the underlying loader into the next epoch.
pub struct DataLoader {
    loader: BatchLoader,
    batch: Batch,
}

impl DataLoader {
    pub fn open<P: AsRef<Path>>(path: P, config: &LoaderConfig) -> Result<Self, DataError> {
        let loader = BatchLoader::open(path, config)?;
        Self::new(loader)
    }

    /// Wrap an open loader; the batch is sized from its configured batch size,
    /// which must not be 0
    pub fn new(loader: BatchLoader) -> Result<Self, DataError> {
        let batch = Batch::new(loader.owned_batch_capacity()?);
        Ok(DataLoader { loader, batch })
    }

    /// Next batch of the current epoch, or `None` at the epoch boundary.
    pub fn next_batch(&mut self) -> Result<Option<&Batch>, DataError> {
        match self.loader.load(&mut self.batch)? {
            EpochStatus::Continuing => Ok(Some(&self.batch)),
            EpochStatus::WrappedToNewEpoch => {
                self.loader.reopen()?;
                Ok(None)
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.loader.epoch()
    }

    #[inline]
    #[must_use]
    pub fn loader(&self) -> &BatchLoader {
        &self.loader
    }

    /// Release the file. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.loader.close();
    }
}
