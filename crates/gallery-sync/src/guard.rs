//! Mutual exclusion for sync transactions
//!
//! A transaction needs two locks: an in-process mutex shared by every trigger
//! in this process, and an advisory file lock inside the repository's git
//! directory shared by every process using the same working tree. Both are
//! owned by a [`SyncPermit`] and released when it drops, whatever path the
//! transaction leaves by.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use fs2::FileExt;

use crate::Result;

/// Name of the lock file created inside the git directory
pub const LOCK_FILE_NAME: &str = "gallery-sync.lock";

/// Hands out at most one [`SyncPermit`] at a time.
#[derive(Debug, Default)]
pub struct ConcurrencyGuard {
    slot: Mutex<()>,
    held: AtomicBool,
    lock_path: Option<PathBuf>,
}

/// Proof that the caller holds the guard.
#[derive(Debug)]
pub struct SyncPermit<'a> {
    _slot: MutexGuard<'a, ()>,
    held: &'a AtomicBool,
    file: Option<File>,
}

impl Drop for SyncPermit<'_> {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
        if let Some(file) = &self.file {
            // closing the handle releases it too
            let _ = FileExt::unlock(file);
        }
    }
}

impl ConcurrencyGuard {
    /// Guard covering this process only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard that additionally excludes other processes locking `path`.
    pub fn with_lock_file(path: impl Into<PathBuf>) -> Self {
        Self {
            slot: Mutex::new(()),
            held: AtomicBool::new(false),
            lock_path: Some(path.into()),
        }
    }

    /// Whether a permit from this guard is currently alive. Never takes the
    /// guard and only sees this process.
    pub fn is_busy(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Take the guard without waiting. `Ok(None)` means another transaction
    /// holds it.
    pub fn try_acquire(&self) -> Result<Option<SyncPermit<'_>>> {
        let slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::WouldBlock) => return Ok(None),
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("Previous sync transaction panicked; recovering guard");
                self.slot.clear_poison();
                poisoned.into_inner()
            }
        };

        let file = match &self.lock_path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(false)
                    .open(path)?;
                match FileExt::try_lock_exclusive(&file) {
                    Ok(()) => Some(file),
                    Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                        tracing::debug!(path = %path.display(), "Sync lock held by another process");
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => None,
        };

        self.held.store(true, Ordering::Release);
        Ok(Some(SyncPermit {
            _slot: slot,
            held: &self.held,
            file,
        }))
    }
}
