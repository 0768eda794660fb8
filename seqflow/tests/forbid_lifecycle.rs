//! End-to-end forbid lifecycle: discovery across a basecall tree, the
//! revocation pass via the CLI, and idempotence on repeat invocations.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

use seqflow::exit_codes;
use seqflow::forbid::{ForbidOutcome, forbid};
use seqflow::io::config::{WorkflowConfig, write_config};
use seqflow::io::scan::discover_runs;
use seqflow::test_support::{mark_complete, scaffold_run, test_config};

fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).expect("stat").permissions().mode() & 0o777
}

#[test]
fn scan_forbid_locks_down_only_completed_runs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let group = temp.path().join(".seq_M1");
    let complete = scaffold_run(&group, "run42");
    let in_progress = scaffold_run(&group, "run43");
    mark_complete(&complete);

    let mut cfg = WorkflowConfig::default();
    cfg.hostname = "test-host".to_string();
    cfg.basecall_dir = temp.path().display().to_string();
    cfg.grace_secs = 0;
    let config_path = temp.path().join("workflow.toml");
    write_config(&config_path, &cfg).expect("write config");

    let status = Command::new(env!("CARGO_BIN_EXE_seqflow"))
        .arg("--config")
        .arg(&config_path)
        .args(["scan", "forbid"])
        .status()
        .expect("seqflow scan forbid");

    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(mode_of(complete.path()), 0);
    assert_ne!(mode_of(in_progress.path()), 0);
    assert!(!complete.forbid_lock_marker().exists());
    assert!(!in_progress.forbid_lock_marker().exists());

    // Second pass over the same tree is a no-op and still exits 0.
    let status = Command::new(env!("CARGO_BIN_EXE_seqflow"))
        .arg("--config")
        .arg(&config_path)
        .args(["scan", "forbid"])
        .status()
        .expect("seqflow scan forbid again");
    assert_eq!(status.code(), Some(exit_codes::OK));

    restore(complete.path());
}

#[test]
fn discovery_feeds_the_forbid_protocol() {
    let temp = tempfile::tempdir().expect("tempdir");
    let group = temp.path().join(".seq_N2");
    let run = scaffold_run(&group, "run50");
    mark_complete(&run);
    let cfg = test_config();

    let discovered = discover_runs(temp.path(), r"^\.seq_").expect("discover");
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].run_name(), "run50");

    let outcome = forbid(&discovered[0], &cfg).expect("forbid");
    assert_eq!(outcome, ForbidOutcome::Forbidden);
    assert_eq!(mode_of(run.path()), 0);

    // The run stays discoverable after lockdown; repeat passes see it as
    // already forbidden.
    let rediscovered = discover_runs(temp.path(), r"^\.seq_").expect("discover again");
    assert_eq!(rediscovered.len(), 1);
    let outcome = forbid(&rediscovered[0], &cfg).expect("forbid again");
    assert_eq!(outcome, ForbidOutcome::AlreadyForbidden);

    restore(run.path());
}

#[test]
fn foreign_lock_survives_a_full_pass() {
    let temp = tempfile::tempdir().expect("tempdir");
    let group = temp.path().join(".seq_M1");
    let run = scaffold_run(&group, "run42");
    mark_complete(&run);
    fs::write(run.forbid_lock_marker(), b"").expect("foreign lock");
    let cfg = test_config();

    let outcome = forbid(&run, &cfg).expect("forbid");
    assert_eq!(outcome, ForbidOutcome::LockHeld);
    assert!(run.forbid_lock_marker().exists());
    assert_ne!(mode_of(run.path()), 0);
}

fn restore(path: &Path) {
    let mut perms = fs::metadata(path).expect("stat").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod back");
}
