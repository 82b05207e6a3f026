//! Background batch production with a fixed buffer pool.
//!
//! A worker thread owns the [`BatchLoader`] and fills buffers taken from a
//! pool channel; filled buffers travel back over a second channel. The
//! consumer holds at most one buffer at a time as a [`PrefetchedBatch`] loan,
//! which returns the buffer to the pool when released or dropped. While the
//! consumer reads batch N the worker is already filling N+1.

use std::io;
use std::ops::Deref;
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use super::batch::Batch;
use super::error::{DataError, Violation};
use super::loader::{BatchLoader, EpochStatus};
use crate::config::LoaderConfig;

enum Message {
    Filled(Batch),
    EndOfEpoch,
    Failed(DataError),
}

/// Consumer side of the background producer.
///
/// `next_batch` yields the batches of one epoch, then `None` once; the worker
/// has already reopened the loader and is prefetching the next epoch.
pub struct Prefetcher {
    pool: Option<Sender<Batch>>,
    filled: Option<Receiver<Message>>,
    worker: Option<JoinHandle<()>>,
    epoch: u64,
}

impl Prefetcher {
    /// Open `path` and start prefetching with `config.prefetch_buffers` buffers
    /// of `config.batch_size` samples. A batch size of 0 is rejected here; use
    /// [`Prefetcher::spawn`] to size the buffers explicitly.
    pub fn open<P: AsRef<Path>>(path: P, config: &LoaderConfig) -> Result<Self, DataError> {
        let loader = BatchLoader::open(path, config)?;
        let capacity = loader.owned_batch_capacity()?;
        Self::spawn(loader, capacity, config.prefetch_buffers)
    }

    /// Move `loader` onto a worker thread with `buffers` batches of `capacity` samples
    pub fn spawn(loader: BatchLoader, capacity: u32, buffers: usize) -> Result<Self, DataError> {
        let buffers = buffers.max(1);
        let (pool_tx, pool_rx) = bounded::<Batch>(buffers);
        // Room for every buffer plus an end-of-epoch marker, so the worker
        // only ever blocks waiting for an empty buffer
        let (filled_tx, filled_rx) = bounded::<Message>(buffers + 1);

        for _ in 0..buffers {
            pool_tx
                .send(Batch::new(capacity))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "buffer pool closed"))?;
        }

        let worker = thread::Builder::new()
            .name("batch-prefetch".to_string())
            .spawn(move || run_worker(loader, pool_rx, filled_tx))?;

        Ok(Prefetcher {
            pool: Some(pool_tx),
            filled: Some(filled_rx),
            worker: Some(worker),
            epoch: 0,
        })
    }

    /// Wait for the next filled batch.
    ///
    /// The returned loan must be dropped (or [released](PrefetchedBatch::release))
    /// before the next call; the borrow checker enforces this.
    pub fn next_batch(&mut self) -> Result<Option<PrefetchedBatch<'_>>, DataError> {
        let filled = self.filled.as_ref().ok_or(Violation::LoaderClosed)?;
        match filled.recv() {
            Ok(Message::Filled(batch)) => {
                let pool = self.pool.as_ref().ok_or(Violation::LoaderClosed)?;
                Ok(Some(PrefetchedBatch {
                    batch: Some(batch),
                    pool,
                }))
            }
            Ok(Message::EndOfEpoch) => {
                self.epoch += 1;
                Ok(None)
            }
            Ok(Message::Failed(err)) => {
                self.close();
                Err(err)
            }
            Err(_) => {
                self.close();
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "prefetch worker stopped").into())
            }
        }
    }

    /// Epochs completed by the consumer
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop the worker and release every buffer. Closing twice is a no-op.
    pub fn close(&mut self) {
        // Disconnecting both channels wakes the worker wherever it waits
        self.pool = None;
        self.filled = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("batch prefetch worker panicked");
            }
        }
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(mut loader: BatchLoader, pool: Receiver<Batch>, filled: Sender<Message>) {
    let mut spare: Option<Batch> = None;
    loop {
        let Some(mut batch) = spare.take().or_else(|| pool.recv().ok()) else {
            break;
        };
        let message = match loader.load(&mut batch) {
            Ok(EpochStatus::Continuing) => Message::Filled(batch),
            Ok(EpochStatus::WrappedToNewEpoch) => {
                spare = Some(batch);
                if let Err(err) = loader.reopen() {
                    log::error!("cannot start next epoch: {err}");
                    let _ = filled.send(Message::EndOfEpoch);
                    let _ = filled.send(Message::Failed(err));
                    break;
                }
                Message::EndOfEpoch
            }
            Err(err) => {
                log::error!("batch prefetch failed: {err}");
                let _ = filled.send(Message::Failed(err));
                break;
            }
        };
        if filled.send(message).is_err() {
            break;
        }
    }
    loader.close();
}

/// A filled batch on loan from a [`Prefetcher`].
pub struct PrefetchedBatch<'a> {
    batch: Option<Batch>,
    pool: &'a Sender<Batch>,
}

impl PrefetchedBatch<'_> {
    /// Hand the buffer back to the worker
    pub fn release(self) {}
}

impl Deref for PrefetchedBatch<'_> {
    type Target = Batch;

    fn deref(&self) -> &Batch {
        // Only `Drop` empties the option
        match &self.batch {
            Some(batch) => batch,
            None => unreachable!("prefetched batch used after release"),
        }
    }
}

impl Drop for PrefetchedBatch<'_> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            // A closed pool means the worker is gone; the buffer is freed here
            let _ = self.pool.send(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use crate::data::sample::{Outcome, Sample};
    use crate::data::writer::write_samples;
    use tempfile::NamedTempFile;

    fn dataset(count: usize) -> NamedTempFile {
        let samples: Vec<Sample> = (0..count)
            .map(|i| Sample::new(Position::startpos(), Outcome::WhiteWins, Some(i as i16)))
            .collect();
        let file = NamedTempFile::new().unwrap();
        write_samples(file.path(), &samples).unwrap();
        file
    }

    fn config(batch_size: u32, buffers: usize) -> LoaderConfig {
        LoaderConfig {
            batch_size,
            shuffle_buffer_samples: 16,
            seed: Some(3),
            prefetch_buffers: buffers,
        }
    }

    #[test]
    fn yields_epoch_then_boundary() {
        let file = dataset(7);
        let mut prefetcher = Prefetcher::open(file.path(), &config(3, 2)).unwrap();

        for epoch in 0..3u64 {
            assert_eq!(prefetcher.epoch(), epoch);
            let mut sizes = Vec::new();
            while let Some(batch) = prefetcher.next_batch().unwrap() {
                sizes.push(batch.size());
                assert!(batch.view().validate().is_ok());
            }
            assert_eq!(sizes, vec![3, 3, 1]);
        }
    }

    #[test]
    fn single_buffer_pool_recycles() {
        let file = dataset(5);
        let mut prefetcher = Prefetcher::open(file.path(), &config(1, 1)).unwrap();
        let mut evals = Vec::new();
        while let Some(batch) = prefetcher.next_batch().unwrap() {
            evals.extend_from_slice(batch.evals());
            batch.release();
        }
        evals.sort_by(f32::total_cmp);
        assert_eq!(evals, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn close_is_idempotent() {
        let file = dataset(2);
        let mut prefetcher = Prefetcher::open(file.path(), &config(1, 2)).unwrap();
        {
            let first = prefetcher.next_batch().unwrap();
            assert!(first.is_some());
        }
        prefetcher.close();
        prefetcher.close();
        assert!(!prefetcher.is_open());
        assert!(matches!(
            prefetcher.next_batch(),
            Err(DataError::ContractViolation(Violation::LoaderClosed))
        ));
    }

    #[test]
    fn zero_batch_size_needs_explicit_capacity() {
        let file = dataset(5);
        assert!(matches!(
            Prefetcher::open(file.path(), &config(0, 2)),
            Err(DataError::ContractViolation(Violation::ZeroBatchSize))
        ));

        let loader = BatchLoader::open(file.path(), &config(0, 2)).unwrap();
        let mut prefetcher = Prefetcher::spawn(loader, 4, 2).unwrap();
        let mut sizes = Vec::new();
        while let Some(batch) = prefetcher.next_batch().unwrap() {
            sizes.push(batch.size());
        }
        assert_eq!(sizes, vec![4, 1]);
    }

    #[test]
    fn empty_dataset_reports_boundary() {
        let file = dataset(0);
        let mut prefetcher = Prefetcher::open(file.path(), &config(4, 2)).unwrap();
        assert!(prefetcher.next_batch().unwrap().is_none());
        assert!(prefetcher.next_batch().unwrap().is_none());
    }
}
