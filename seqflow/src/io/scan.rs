//! Run directory discovery under the basecall directory.
//!
//! Sequencer machines drop their output into hidden group directories
//! (`.seq_M1`, `.seq_N2`, ...) under the basecall dir; each subdirectory of
//! a group is one run. Scans yield every run directory, sorted, so periodic
//! invocations process runs in a stable order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::core::run_dir::RunDirectory;

/// Enumerate run directories under `basecall_dir`.
///
/// Group directories are those whose name matches `pattern`; non-directory
/// entries are skipped at both levels.
pub fn discover_runs(basecall_dir: &Path, pattern: &str) -> Result<Vec<RunDirectory>> {
    let pattern = Regex::new(pattern)
        .with_context(|| format!("compile seq_dir_pattern '{pattern}'"))?;
    let mut run_dirs: Vec<PathBuf> = Vec::new();

    let groups = fs::read_dir(basecall_dir)
        .with_context(|| format!("read basecall dir {}", basecall_dir.display()))?;
    for group in groups {
        let group = group
            .with_context(|| format!("read basecall dir entry in {}", basecall_dir.display()))?;
        let name = group.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !pattern.is_match(name) || !group.path().is_dir() {
            continue;
        }

        let runs = fs::read_dir(group.path())
            .with_context(|| format!("read group dir {}", group.path().display()))?;
        for run in runs {
            let run =
                run.with_context(|| format!("read group dir entry in {}", group.path().display()))?;
            if run.path().is_dir() {
                run_dirs.push(run.path());
            }
        }
    }

    run_dirs.sort();
    debug!(
        basecall_dir = %basecall_dir.display(),
        count = run_dirs.len(),
        "discovered run directories"
    );
    run_dirs.into_iter().map(RunDirectory::new).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn finds_runs_in_matching_groups_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(".seq_M1/run42")).expect("mkdir");
        fs::create_dir_all(temp.path().join(".seq_N2/run43")).expect("mkdir");
        fs::create_dir_all(temp.path().join("sample_sheets/run44")).expect("mkdir");
        fs::write(temp.path().join(".seq_M1/stray.txt"), b"").expect("write");

        let runs = discover_runs(temp.path(), r"^\.seq_").expect("discover");
        let names: Vec<&str> = runs.iter().map(RunDirectory::run_name).collect();
        assert_eq!(names, vec!["run42", "run43"]);
    }

    #[test]
    fn empty_basecall_dir_yields_no_runs() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(
            discover_runs(temp.path(), r"^\.seq_")
                .expect("discover")
                .is_empty()
        );
    }

    #[test]
    fn missing_basecall_dir_is_an_error() {
        assert!(discover_runs(Path::new("/nonexistent/seqflow-test"), r"^\.seq_").is_err());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(discover_runs(temp.path(), r"(").is_err());
    }
}
