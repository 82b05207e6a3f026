//! Owning wrappers for consumers that drive the producer through the C ABI.
//!
//! Mirrors what a foreign trainer does with the exported functions, but every
//! handle is released by `Drop`, so early returns and epoch reopen cycles
//! cannot leak native resources.

use std::ffi::CString;
use std::io;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use super::{
    batch_capacity, batch_evals, batch_non_stm_features, batch_outcomes, batch_size,
    batch_stm_features, batch_total_features, close_loader, create_batch, drop_batch,
    load_batch, load_next_batch, loader_last_error, open_loader,
};
use crate::data::{Batch, BatchLoader, BatchView, DataError, EpochStatus, Violation};

/// A batch allocated on the producer side
pub struct OwnedBatch {
    raw: NonNull<Batch>,
}

impl OwnedBatch {
    pub fn new(capacity: u32) -> Self {
        let raw = NonNull::new(create_batch(capacity))
            .unwrap_or_else(|| unreachable!("create_batch never returns null"));
        OwnedBatch { raw }
    }

    /// Take ownership of a pointer handed out by the producer
    fn from_raw(raw: *mut Batch) -> Option<Self> {
        NonNull::new(raw).map(|raw| OwnedBatch { raw })
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        unsafe { batch_capacity(self.raw.as_ptr()) }
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        unsafe { batch_size(self.raw.as_ptr()) }
    }

    /// Length-checked view over the exported pointers
    pub fn view(&self) -> Result<BatchView<'_>, Violation> {
        let batch = self.raw.as_ptr();
        // The batch stays alive and unmodified while `self` is borrowed
        unsafe {
            BatchView::from_raw_parts(
                batch_capacity(batch),
                batch_size(batch),
                batch_total_features(batch),
                batch_stm_features(batch),
                batch_non_stm_features(batch),
                batch_evals(batch),
                batch_outcomes(batch),
            )
        }
    }
}

impl Drop for OwnedBatch {
    fn drop(&mut self) {
        unsafe { drop_batch(self.raw.as_ptr()) }
    }
}

/// An open loader handle that can be cycled through epochs
pub struct LoaderHandle {
    raw: Option<NonNull<BatchLoader>>,
    path: PathBuf,
    batch_size: u32,
}

impl LoaderHandle {
    pub fn open<P: AsRef<Path>>(path: P, batch_size: u32) -> Result<Self, DataError> {
        let mut handle = LoaderHandle {
            raw: None,
            path: path.as_ref().to_path_buf(),
            batch_size,
        };
        handle.reopen()?;
        Ok(handle)
    }

    /// Close the loader and open the file again for a new epoch
    pub fn reopen(&mut self) -> Result<(), DataError> {
        self.close();
        let unavailable = |reason: &str| DataError::SourceUnavailable {
            path: self.path.clone(),
            reason: reason.to_string(),
        };
        let path = self
            .path
            .to_str()
            .ok_or_else(|| unavailable("path is not valid UTF-8"))?;
        let path = CString::new(path).map_err(|_| unavailable("path contains a NUL byte"))?;

        let raw = unsafe { open_loader(path.as_ptr(), self.batch_size) };
        self.raw = Some(NonNull::new(raw).ok_or_else(|| unavailable("open_loader failed"))?);
        Ok(())
    }

    /// Fill `batch` with the next batch of the epoch
    pub fn load(&mut self, batch: &mut OwnedBatch) -> Result<EpochStatus, DataError> {
        let raw = self.raw.ok_or(Violation::LoaderClosed)?;
        if unsafe { load_batch(raw.as_ptr(), batch.raw.as_ptr()) } {
            return Ok(EpochStatus::Continuing);
        }
        self.check(raw)?;
        Ok(EpochStatus::WrappedToNewEpoch)
    }

    /// Producer-allocated next batch, or `None` at the epoch boundary
    pub fn next_batch(&mut self) -> Result<Option<OwnedBatch>, DataError> {
        let raw = self.raw.ok_or(Violation::LoaderClosed)?;
        match OwnedBatch::from_raw(unsafe { load_next_batch(raw.as_ptr()) }) {
            Some(batch) => Ok(Some(batch)),
            None => self.check(raw).map(|()| None),
        }
    }

    /// Turn the loader's last error code back into an error
    fn check(&self, raw: NonNull<BatchLoader>) -> Result<(), DataError> {
        match unsafe { loader_last_error(raw.as_ptr()) } {
            0 => Ok(()),
            code => Err(match Violation::from_code(code) {
                Some(violation) => violation.into(),
                None => DataError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!(
                        "batch producer failed with code {code} reading {}",
                        self.path.display()
                    ),
                )),
            }),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.raw.is_some()
    }

    /// Release the loader. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(raw) = self.raw.take() {
            unsafe { close_loader(raw.as_ptr()) }
        }
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.close();
    }
}
