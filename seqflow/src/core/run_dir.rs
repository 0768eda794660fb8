//! Run directory identity and derived marker paths.
//!
//! A run directory `D` with run name `N` (final path segment) owns four
//! sibling marker files and one sentinel inside the directory:
//!
//! | Marker          | Path               | Meaning                            |
//! |-----------------|--------------------|------------------------------------|
//! | Error           | `D.err`            | halts all workflow execution       |
//! | Skip            | `D.skip`           | run should be skipped this turn    |
//! | Processing lock | `D.lock`           | guards workflow steps              |
//! | Forbid lock     | `D.forbid.lock`    | guards the forbid protocol         |
//! | Completion      | `D/RTAComplete.txt`| sequencing finished                |
//!
//! Derivation is pure; markers are created and removed elsewhere.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Sentinel the sequencer writes inside the run directory when done.
pub const COMPLETION_SENTINEL: &str = "RTAComplete.txt";

/// All canonical paths for one run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
    run_name: String,
    error_marker: PathBuf,
    skip_marker: PathBuf,
    lock_marker: PathBuf,
    forbid_lock_marker: PathBuf,
    completion_marker: PathBuf,
}

impl RunDirectory {
    /// Build the path set for `path`.
    ///
    /// Fails on an empty path or one without a final segment (`/`, `..`):
    /// marker names cannot be derived for those.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(anyhow!("run directory path must not be empty"));
        }
        let run_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "run directory path {} has no usable final segment",
                    path.display()
                )
            })?;

        let sibling = |suffix: &str| -> PathBuf {
            let mut marker = path.as_os_str().to_owned();
            marker.push(suffix);
            PathBuf::from(marker)
        };
        let error_marker = sibling(".err");
        let skip_marker = sibling(".skip");
        let lock_marker = sibling(".lock");
        let forbid_lock_marker = sibling(".forbid.lock");
        let completion_marker = path.join(COMPLETION_SENTINEL);

        Ok(Self {
            error_marker,
            skip_marker,
            lock_marker,
            forbid_lock_marker,
            completion_marker,
            path,
            run_name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path segment, used as the run identifier in logs.
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Error marker: halts all workflow execution until removed by hand.
    pub fn error_marker(&self) -> &Path {
        &self.error_marker
    }

    /// Skip marker: the run should be passed over this turn.
    pub fn skip_marker(&self) -> &Path {
        &self.skip_marker
    }

    /// Processing lock, guarding workflow step execution.
    pub fn lock_marker(&self) -> &Path {
        &self.lock_marker
    }

    /// Forbid lock, guarding the access-revocation protocol.
    pub fn forbid_lock_marker(&self) -> &Path {
        &self.forbid_lock_marker
    }

    /// Completion sentinel inside the run directory.
    pub fn completion_marker(&self) -> &Path {
        &self.completion_marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_sibling_markers_and_run_name() {
        let run = RunDirectory::new("/data/basecalls/.seq_M1/run42").expect("run dir");
        assert_eq!(run.run_name(), "run42");
        assert_eq!(
            run.error_marker(),
            Path::new("/data/basecalls/.seq_M1/run42.err")
        );
        assert_eq!(
            run.skip_marker(),
            Path::new("/data/basecalls/.seq_M1/run42.skip")
        );
        assert_eq!(
            run.lock_marker(),
            Path::new("/data/basecalls/.seq_M1/run42.lock")
        );
        assert_eq!(
            run.forbid_lock_marker(),
            Path::new("/data/basecalls/.seq_M1/run42.forbid.lock")
        );
        assert_eq!(
            run.completion_marker(),
            Path::new("/data/basecalls/.seq_M1/run42/RTAComplete.txt")
        );
    }

    #[test]
    fn rejects_empty_path() {
        assert!(RunDirectory::new("").is_err());
    }

    #[test]
    fn rejects_path_without_final_segment() {
        assert!(RunDirectory::new("/").is_err());
        assert!(RunDirectory::new("/data/..").is_err());
    }

    #[test]
    fn relative_paths_are_accepted() {
        let run = RunDirectory::new("run42").expect("run dir");
        assert_eq!(run.error_marker(), Path::new("run42.err"));
    }
}
