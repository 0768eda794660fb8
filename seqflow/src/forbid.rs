//! Access revocation ("forbid") for completed run directories.
//!
//! Once the sequencer is done with a run, access to the data is revoked
//! exactly once by dropping the directory's permission bits to `0000`. The
//! protocol must tolerate concurrent invocations and partial failures:
//!
//! 1. Forbid lock held elsewhere → halt, another invocation owns the
//!    operation.
//! 2. Already forbidden → halt, idempotent no-op. Forbidden is terminal, so
//!    it is checked before completeness: the completion sentinel lives
//!    *inside* the run directory, and an unprivileged invocation cannot
//!    stat through a `0000` directory.
//! 3. Run not complete → halt, too early.
//! 4. Acquire the forbid lock (atomic create-exclusive; losing the race is
//!    a halt, not an error).
//! 5. Grace sleep, letting readers that slipped in before the completion
//!    check finish.
//! 6. chmod `0000`.
//! 7. Release the lock on every exit path, including a failed chmod.
//!
//! Permissions are never downgraded on a directory that is still locked,
//! not yet complete, or already forbidden, so repeated invocations are safe.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::run_dir::RunDirectory;
use crate::io::config::WorkflowConfig;
use crate::io::{lock, status};

/// How a forbid invocation ended. Every variant except `Forbidden` is a
/// designed no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForbidOutcome {
    /// Permissions were revoked by this invocation.
    Forbidden,
    /// Another invocation holds the forbid lock.
    LockHeld,
    /// The sequencer has not finished this run yet.
    NotComplete,
    /// Permissions were already revoked earlier.
    AlreadyForbidden,
}

/// Performs the actual permission change, seam for failure-injection in
/// tests.
pub trait AccessRevoker {
    fn revoke(&self, dir: &Path) -> Result<()>;
}

/// Production revoker: chmod the run directory to `0000`.
pub struct ChmodRevoker;

impl AccessRevoker for ChmodRevoker {
    fn revoke(&self, dir: &Path) -> Result<()> {
        let mut perms = fs::metadata(dir)
            .with_context(|| format!("stat run directory {}", dir.display()))?
            .permissions();
        perms.set_mode(0o000);
        fs::set_permissions(dir, perms)
            .with_context(|| format!("revoke permissions on {}", dir.display()))
    }
}

/// Revoke access to `run` once sequencing is complete.
pub fn forbid(run: &RunDirectory, cfg: &WorkflowConfig) -> Result<ForbidOutcome> {
    forbid_with(run, cfg, &ChmodRevoker)
}

/// [`forbid`] with an explicit revoker.
pub fn forbid_with<R: AccessRevoker>(
    run: &RunDirectory,
    cfg: &WorkflowConfig,
    revoker: &R,
) -> Result<ForbidOutcome> {
    let lock_path = run.forbid_lock_marker();

    if lock::is_locked(lock_path)? {
        lock::warn_if_stale(lock_path, Duration::from_secs(cfg.lock_stale_warn_secs))?;
        info!(run = %run.run_name(), "forbid lock held by another invocation, skipping");
        return Ok(ForbidOutcome::LockHeld);
    }
    // Forbidden first: it only stats the directory itself, while the
    // completion check stats inside it, which fails for unprivileged
    // invocations once the mode is 0000.
    if status::is_forbidden(run)? {
        debug!(run = %run.run_name(), "already forbidden");
        return Ok(ForbidOutcome::AlreadyForbidden);
    }
    if !status::seq_complete(run)? {
        debug!(run = %run.run_name(), "sequencing not complete, nothing to forbid");
        return Ok(ForbidOutcome::NotComplete);
    }

    // The presence check above and this create are not one atomic step;
    // create_new resolves the race by letting exactly one invocation win.
    let Some(guard) = lock::acquire(lock_path)? else {
        info!(run = %run.run_name(), "lost forbid lock race, skipping");
        return Ok(ForbidOutcome::LockHeld);
    };

    // Readers that opened the directory just before the completion check get
    // a chance to finish before permissions are pulled.
    if cfg.grace_secs > 0 {
        debug!(run = %run.run_name(), grace_secs = cfg.grace_secs, "grace wait");
        thread::sleep(Duration::from_secs(cfg.grace_secs));
    }

    let revoked = revoker.revoke(run.path());
    // The guard must go away whether or not revocation worked; a failed
    // chmod with a stranded lock would wedge every later invocation.
    let released = guard.release();
    revoked?;
    released?;

    info!(
        run = %run.run_name(),
        dir = %run.path().display(),
        "revoked access, permissions set to 0000"
    );
    Ok(ForbidOutcome::Forbidden)
}
