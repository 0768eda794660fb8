//! Read-only status queries over a run directory.
//!
//! All queries are non-mutating. A filesystem failure (permission denied,
//! NFS share offline, path vanished mid-check) surfaces as an error to the
//! caller; it is never silently reported as `false`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::run_dir::RunDirectory;

/// Is the error marker set? While present, no workflow step may execute for
/// this run; the marker must be removed by hand for the workflow to resume.
pub fn has_errors(run: &RunDirectory) -> Result<bool> {
    marker_present(run.error_marker())
}

/// Is the skip marker set? Exposed for callers; the skip action policy
/// itself lives outside this crate.
pub fn to_skip(run: &RunDirectory) -> Result<bool> {
    marker_present(run.skip_marker())
}

/// Has the sequencer finished producing data for this run?
pub fn seq_complete(run: &RunDirectory) -> Result<bool> {
    marker_present(run.completion_marker())
}

/// Has access to the run directory already been revoked?
///
/// A directory is forbidden iff none of the owner/group/other
/// read/write/execute bits are set.
pub fn is_forbidden(run: &RunDirectory) -> Result<bool> {
    let metadata = fs::metadata(run.path())
        .with_context(|| format!("stat run directory {}", run.path().display()))?;
    let mode = metadata.permissions().mode() & 0o777;
    let octal = format!("{mode:04o}");
    debug!(run = %run.run_name(), mode = %octal, "checked permissions");
    Ok(mode == 0)
}

/// Existence check that propagates I/O errors instead of masking them.
fn marker_present(path: &Path) -> Result<bool> {
    path.try_exists()
        .with_context(|| format!("check marker {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::scaffold_run;

    #[test]
    fn markers_absent_on_fresh_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = scaffold_run(temp.path(), "run42");

        assert!(!has_errors(&run).expect("has_errors"));
        assert!(!to_skip(&run).expect("to_skip"));
        assert!(!seq_complete(&run).expect("seq_complete"));
    }

    #[test]
    fn marker_presence_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = scaffold_run(temp.path(), "run42");

        fs::write(run.error_marker(), b"").expect("touch err");
        fs::write(run.skip_marker(), b"").expect("touch skip");
        fs::write(run.completion_marker(), b"").expect("touch sentinel");

        assert!(has_errors(&run).expect("has_errors"));
        assert!(to_skip(&run).expect("to_skip"));
        assert!(seq_complete(&run).expect("seq_complete"));
    }

    #[test]
    fn forbidden_tracks_permission_bits() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = scaffold_run(temp.path(), "run42");

        assert!(!is_forbidden(&run).expect("is_forbidden"));

        let mut perms = fs::metadata(run.path()).expect("stat").permissions();
        perms.set_mode(0o000);
        fs::set_permissions(run.path(), perms).expect("chmod");
        assert!(is_forbidden(&run).expect("is_forbidden"));

        // Restore so tempdir cleanup can proceed on any platform.
        let mut perms = fs::metadata(run.path()).expect("stat").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(run.path(), perms).expect("chmod back");
    }

    #[test]
    fn missing_run_directory_is_an_error_not_false() {
        let run = RunDirectory::new("/nonexistent/seqflow-test/run42").expect("run dir");
        assert!(is_forbidden(&run).is_err());
    }
}
