//! Workflow step dispatch.
//!
//! Validates a requested step against the configured allow-list, brackets
//! execution with a start/end log envelope (including a JSON snapshot of the
//! effective configuration for diagnostics), and forwards the step to the
//! external handler. The error marker takes precedence over everything:
//! while it is set, nothing runs for this directory.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::core::run_dir::RunDirectory;
use crate::io::config::WorkflowConfig;
use crate::io::handler::{StepHandler, StepRequest};
use crate::io::status;

/// How a dispatch invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The handler ran the step to completion.
    Completed,
    /// The error marker is set; nothing was dispatched.
    ErrorHalt,
}

/// Step name outside the configured allow-list. Fatal; the handler is never
/// invoked and the process exits with the usage code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalStepError {
    pub step: String,
}

impl fmt::Display for IllegalStepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal step name '{}'", self.step)
    }
}

impl Error for IllegalStepError {}

#[derive(Serialize)]
struct StartSnapshot<'a> {
    run_dir: String,
    run_name: &'a str,
    step: &'a str,
    options: &'a BTreeMap<String, String>,
    config: &'a WorkflowConfig,
}

/// Run the workflow for `run` starting from `step`.
///
/// The handler is invoked exactly once, and only when the error marker is
/// absent and the step is allow-listed.
pub fn run_from<H: StepHandler>(
    run: &RunDirectory,
    cfg: &WorkflowConfig,
    handler: &H,
    step: &str,
    options: &BTreeMap<String, String>,
) -> Result<DispatchOutcome> {
    // The error marker wins over everything, including allow-list checks.
    if status::has_errors(run)? {
        info!(
            run = %run.run_name(),
            host = %cfg.hostname,
            marker = %run.error_marker().display(),
            "error marker present, refusing to run until it is removed by hand"
        );
        return Ok(DispatchOutcome::ErrorHalt);
    }

    if !cfg.allowed_steps.iter().any(|allowed| allowed == step) {
        error!(run = %run.run_name(), host = %cfg.hostname, step, "illegal step name");
        return Err(IllegalStepError {
            step: step.to_string(),
        }
        .into());
    }

    let snapshot = serde_json::to_string(&StartSnapshot {
        run_dir: run.path().display().to_string(),
        run_name: run.run_name(),
        step,
        options,
        config: cfg,
    })?;
    info!(
        run = %run.run_name(),
        host = %cfg.hostname,
        step,
        snapshot = %snapshot,
        "workflow start"
    );

    let request = StepRequest {
        run_dir: run.path().to_path_buf(),
        step: step.to_string(),
        options: options.clone(),
        timeout: Duration::from_secs(cfg.handler.timeout_secs),
        output_limit_bytes: cfg.handler.output_limit_bytes,
    };
    handler.run(&request)?;

    info!(run = %run.run_name(), host = %cfg.hostname, step, "workflow end");
    Ok(DispatchOutcome::Completed)
}
