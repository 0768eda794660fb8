//! Test-only helpers: run-directory scaffolding and scripted collaborators.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::run_dir::RunDirectory;
use crate::forbid::AccessRevoker;
use crate::io::config::WorkflowConfig;
use crate::io::handler::{StepHandler, StepRequest};

/// Create `<root>/<name>` on disk and return its path set.
pub fn scaffold_run(root: &Path, name: &str) -> RunDirectory {
    let path = root.join(name);
    fs::create_dir_all(&path).expect("create run directory");
    RunDirectory::new(path).expect("run directory paths")
}

/// Touch the completion sentinel.
pub fn mark_complete(run: &RunDirectory) {
    fs::write(run.completion_marker(), b"").expect("touch completion sentinel");
}

/// Config with defaults suitable for tests: no grace sleep, default
/// allow-list, `true` as the handler command.
pub fn test_config() -> WorkflowConfig {
    let mut cfg = WorkflowConfig::default();
    cfg.hostname = "test-host".to_string();
    cfg.grace_secs = 0;
    cfg.handler.command = vec!["true".to_string()];
    cfg.handler.timeout_secs = 5;
    cfg
}

/// Step handler that records every request and returns a scripted result.
pub struct ScriptedStepHandler {
    calls: RefCell<Vec<StepRequest>>,
    failure: Option<String>,
}

impl ScriptedStepHandler {
    pub fn succeeding() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    /// Requests seen so far, in order.
    pub fn calls(&self) -> Vec<StepRequest> {
        self.calls.borrow().clone()
    }
}

impl StepHandler for ScriptedStepHandler {
    fn run(&self, request: &StepRequest) -> Result<()> {
        self.calls.borrow_mut().push(request.clone());
        match &self.failure {
            Some(message) => Err(anyhow!("scripted step failure: {message}")),
            None => Ok(()),
        }
    }
}

/// Revoker that always fails, for cleanup-on-failure tests.
pub struct FailingRevoker;

impl AccessRevoker for FailingRevoker {
    fn revoke(&self, dir: &Path) -> Result<()> {
        Err(anyhow!("scripted revocation failure for {}", dir.display()))
    }
}
