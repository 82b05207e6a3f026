//! C ABI of the batch producer.
//!
//! Handles are opaque boxed pointers. Every constructor has a matching
//! release function, and releasing null is a no-op. Batch accessors return
//! pointers into producer-owned memory that stay valid until the next
//! `load_batch` into the same batch or its `drop_batch`.
//!
//! `load_batch` returns `false` both at the epoch boundary and on failure;
//! [`loader_last_error`] tells them apart. Codes: 0 none, 1 source
//! unavailable, 2 read error, 16 and up a contract violation (23 load after
//! the epoch wrapped, 24 loader closed, 25 batch size 0 with a
//! producer-allocated batch, 26 null batch). To start a new epoch close the
//! loader and open it again.

pub mod client;

use std::ffi::{c_char, CStr};
use std::ptr;

use crate::config::LoaderConfig;
use crate::data::{Batch, BatchLoader, DataError, EpochStatus, Violation};

/// Allocate a batch for `capacity` samples. Release with [`drop_batch`].
#[no_mangle]
pub extern "C" fn create_batch(capacity: u32) -> *mut Batch {
    Box::into_raw(Box::new(Batch::new(capacity)))
}

/// # Safety
/// `batch` must be null or a pointer returned by [`create_batch`] or
/// [`load_next_batch`] that has not been released yet.
#[no_mangle]
pub unsafe extern "C" fn drop_batch(batch: *mut Batch) {
    if !batch.is_null() {
        drop(Box::from_raw(batch));
    }
}

/// # Safety
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn batch_capacity(batch: *const Batch) -> u32 {
    batch.as_ref().map_or(0, Batch::capacity)
}

/// # Safety
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn batch_size(batch: *const Batch) -> u32 {
    batch.as_ref().map_or(0, Batch::size)
}

/// # Safety
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn batch_total_features(batch: *const Batch) -> u32 {
    batch.as_ref().map_or(0, Batch::total_features)
}

/// `2 * total_features` values: `(row, feature)` pairs for the side to move.
///
/// # Safety
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn batch_stm_features(batch: *const Batch) -> *const u32 {
    batch
        .as_ref()
        .map_or(ptr::null(), |batch| batch.stm_features().as_ptr())
}

/// # Safety
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn batch_non_stm_features(batch: *const Batch) -> *const u32 {
    batch
        .as_ref()
        .map_or(ptr::null(), |batch| batch.non_stm_features().as_ptr())
}

/// # Safety
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn batch_evals(batch: *const Batch) -> *const f32 {
    batch
        .as_ref()
        .map_or(ptr::null(), |batch| batch.evals().as_ptr())
}

/// # Safety
/// `batch` must be null or a live batch handle.
#[no_mangle]
pub unsafe extern "C" fn batch_outcomes(batch: *const Batch) -> *const f32 {
    batch
        .as_ref()
        .map_or(ptr::null(), |batch| batch.outcomes().as_ptr())
}

/// Open a packed-sample file. Returns null if the path is not UTF-8 or the
/// file cannot be used; the reason is logged.
///
/// # Safety
/// `path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn open_loader(path: *const c_char, batch_size: u32) -> *mut BatchLoader {
    if path.is_null() {
        log::error!("open_loader: null path");
        return ptr::null_mut();
    }
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        log::error!("open_loader: path is not valid UTF-8");
        return ptr::null_mut();
    };

    let config = LoaderConfig::with_batch_size(batch_size);
    match BatchLoader::open(path, &config) {
        Ok(loader) => Box::into_raw(Box::new(loader)),
        Err(err) => {
            log::error!("open_loader: {err}");
            ptr::null_mut()
        }
    }
}

/// # Safety
/// `loader` must be null or a pointer returned by [`open_loader`] that has
/// not been closed yet.
#[no_mangle]
pub unsafe extern "C" fn close_loader(loader: *mut BatchLoader) {
    if !loader.is_null() {
        let mut loader = Box::from_raw(loader);
        loader.close();
    }
}

/// Fill `batch` with the next batch of the epoch.
///
/// Returns `true` while the epoch continues and `false` at the boundary.
/// Contract violations and read failures also return `false`; they are logged
/// and leave a nonzero [`loader_last_error`].
///
/// # Safety
/// `loader` and `batch` must be null or live handles, and no other thread may
/// use either during the call.
#[no_mangle]
pub unsafe extern "C" fn load_batch(loader: *mut BatchLoader, batch: *mut Batch) -> bool {
    let Some(loader) = loader.as_mut() else {
        log::error!("load_batch: null loader");
        return false;
    };
    let Some(batch) = batch.as_mut() else {
        let err: DataError = Violation::NullHandle.into();
        report(&err);
        loader.record_error(&err);
        return false;
    };
    match loader.load(batch) {
        Ok(EpochStatus::Continuing) => true,
        Ok(EpochStatus::WrappedToNewEpoch) => false,
        Err(err) => {
            report(&err);
            false
        }
    }
}

/// Producer-allocating variant of [`load_batch`]: returns a fresh batch the
/// caller releases with [`drop_batch`], or null at the epoch boundary.
///
/// # Safety
/// `loader` must be null or a live loader handle.
#[no_mangle]
pub unsafe extern "C" fn load_next_batch(loader: *mut BatchLoader) -> *mut Batch {
    let Some(loader) = loader.as_mut() else {
        log::error!("load_next_batch: null handle");
        return ptr::null_mut();
    };
    let capacity = match loader.owned_batch_capacity() {
        Ok(capacity) => capacity,
        Err(err) => {
            report(&err);
            loader.record_error(&err);
            return ptr::null_mut();
        }
    };
    let mut batch = Box::new(Batch::new(capacity));
    match loader.load(&mut batch) {
        Ok(EpochStatus::Continuing) => Box::into_raw(batch),
        Ok(EpochStatus::WrappedToNewEpoch) => ptr::null_mut(),
        Err(err) => {
            report(&err);
            ptr::null_mut()
        }
    }
}

/// Code of the loader's most recent failed load, 0 if it succeeded.
/// A null loader reports 0.
///
/// # Safety
/// `loader` must be null or a live loader handle.
#[no_mangle]
pub unsafe extern "C" fn loader_last_error(loader: *const BatchLoader) -> u32 {
    loader.as_ref().map_or(0, BatchLoader::last_error)
}

fn report(err: &DataError) {
    match err.violation() {
        Some(violation) => log::error!("batch contract violation: {violation}"),
        None => log::error!("batch load failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use crate::data::{write_samples, Outcome, Sample};
    use std::ffi::CString;
    use tempfile::NamedTempFile;

    fn dataset(count: usize) -> (NamedTempFile, CString) {
        let samples: Vec<Sample> = (0..count)
            .map(|i| Sample::new(Position::startpos(), Outcome::BlackWins, Some(i as i16)))
            .collect();
        let file = NamedTempFile::new().unwrap();
        write_samples(file.path(), &samples).unwrap();
        let path = CString::new(file.path().to_str().unwrap()).unwrap();
        (file, path)
    }

    #[test]
    fn null_handles_are_harmless() {
        unsafe {
            drop_batch(ptr::null_mut());
            close_loader(ptr::null_mut());
            assert_eq!(batch_size(ptr::null()), 0);
            assert!(batch_evals(ptr::null()).is_null());
            assert!(!load_batch(ptr::null_mut(), ptr::null_mut()));
            assert!(load_next_batch(ptr::null_mut()).is_null());
            assert_eq!(loader_last_error(ptr::null()), 0);
            assert!(open_loader(ptr::null(), 4).is_null());
        }
    }

    #[test]
    fn missing_file_returns_null() {
        let path = CString::new("/nonexistent/teras/data.bin").unwrap();
        assert!(unsafe { open_loader(path.as_ptr(), 4) }.is_null());
    }

    #[test]
    fn caller_allocated_epoch() {
        let (_file, path) = dataset(5);
        unsafe {
            let loader = open_loader(path.as_ptr(), 2);
            assert!(!loader.is_null());
            let batch = create_batch(2);
            assert_eq!(batch_capacity(batch), 2);

            let mut sizes = Vec::new();
            while load_batch(loader, batch) {
                sizes.push(batch_size(batch));
                assert_eq!(batch_total_features(batch), 30 * batch_size(batch));
            }
            assert_eq!(sizes, vec![2, 2, 1]);
            assert_eq!(batch_size(batch), 0);
            assert_eq!(loader_last_error(loader), 0);
            // Loading past the boundary is rejected, not rewound
            assert!(!load_batch(loader, batch));
            assert_eq!(
                loader_last_error(loader),
                Violation::LoadAfterEpochWrap.code()
            );
            assert_eq!((*loader).epoch(), 0);

            assert!(!load_batch(loader, ptr::null_mut()));
            assert_eq!(loader_last_error(loader), Violation::NullHandle.code());

            drop_batch(batch);
            close_loader(loader);
        }
    }

    #[test]
    fn producer_allocated_epoch() {
        let (_file, path) = dataset(3);
        unsafe {
            let loader = open_loader(path.as_ptr(), 2);
            let mut total = 0;
            loop {
                let batch = load_next_batch(loader);
                if batch.is_null() {
                    break;
                }
                total += batch_size(batch);
                assert!(!batch_outcomes(batch).is_null());
                drop_batch(batch);
            }
            assert_eq!(total, 3);
            assert_eq!(loader_last_error(loader), 0);
            close_loader(loader);
        }
    }

    #[test]
    fn producer_allocation_rejects_zero_batch_size() {
        let (_file, path) = dataset(3);
        unsafe {
            let loader = open_loader(path.as_ptr(), 0);
            assert!(load_next_batch(loader).is_null());
            assert_eq!(loader_last_error(loader), Violation::ZeroBatchSize.code());

            // Caller-sized buffers are filled to capacity
            let batch = create_batch(2);
            assert!(load_batch(loader, batch));
            assert_eq!(batch_size(batch), 2);
            assert_eq!(loader_last_error(loader), 0);
            drop_batch(batch);
            close_loader(loader);
        }
    }
}
