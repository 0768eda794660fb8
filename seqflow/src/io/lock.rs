//! Cooperative, file-presence-based locks shared across invocations.
//!
//! Mutual exclusion is by convention: the presence of a lock marker means
//! another invocation owns the operation. Acquisition uses an atomic
//! create-exclusive open, so two invocations racing past the same presence
//! check cannot both end up holding the lock; the loser observes
//! `AlreadyExists` and backs off.
//!
//! Release is scoped: [`LockGuard`] removes the marker on drop, so every
//! exit path of the protocol that acquired it (success, early return,
//! failure, unwind) releases. A crash before the guard exists can still
//! strand a marker, which is what the stale-age warning is for.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Scoped ownership of a lock marker. Dropping the guard removes the marker.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Remove the marker now, reporting failures instead of logging them.
    ///
    /// Dropping the guard has the same effect but can only warn.
    pub fn release(self) -> Result<()> {
        let path = self.path.clone();
        // Skip the Drop impl; removal happens here.
        std::mem::forget(self);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(lock = %path.display(), "released lock");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("remove lock marker {}", path.display()))
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "released lock"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(lock = %self.path.display(), err = %err, "failed to remove lock marker");
            }
        }
    }
}

/// Is the lock marker present?
///
/// `NotFound` means unlocked; any other I/O error propagates — an
/// unreachable share must halt the workflow, not report "unlocked".
pub fn is_locked(path: &Path) -> Result<bool> {
    path.try_exists()
        .with_context(|| format!("check lock marker {}", path.display()))
}

/// Try to acquire the lock by creating its marker atomically.
///
/// Returns `None` when another invocation holds the lock (the marker already
/// exists); that is an expected outcome, not an error.
pub fn acquire(path: &Path) -> Result<Option<LockGuard>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            debug!(lock = %path.display(), "acquired lock");
            Ok(Some(LockGuard {
                path: path.to_path_buf(),
            }))
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            debug!(lock = %path.display(), "lock already held");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("create lock marker {}", path.display())),
    }
}

/// Age of an existing lock marker, or `None` when the marker is absent.
pub fn lock_age(path: &Path) -> Result<Option<Duration>> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("stat lock marker {}", path.display()));
        }
    };
    let modified = metadata
        .modified()
        .with_context(|| format!("read mtime of lock marker {}", path.display()))?;
    // A lock with an mtime in the future counts as age zero.
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    Ok(Some(age))
}

/// Warn when a held lock is older than `threshold`.
///
/// Stale locks are surfaced, never broken: a marker stranded by a crashed
/// invocation is an operator decision to remove.
pub fn warn_if_stale(path: &Path, threshold: Duration) -> Result<()> {
    if let Some(age) = lock_age(path)?.filter(|age| *age > threshold) {
        warn!(
            lock = %path.display(),
            age_secs = age.as_secs(),
            threshold_secs = threshold.as_secs(),
            "lock marker exceeds stale threshold; inspect and remove by hand if stranded"
        );
    }
    Ok(())
}
