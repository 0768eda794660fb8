//! Workflow configuration (TOML).
//!
//! The configuration is loaded once at startup and passed by reference into
//! every component; nothing reads it as ambient global state. Missing fields
//! default to the values the production deployment has always used.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Workflow configuration.
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Host identifier attached to log events (multiple machines share the
    /// same storage; logs must say which one acted).
    pub hostname: String,

    /// Base directory holding the hidden sequencer group directories.
    pub basecall_dir: String,

    /// Regex matched against group directory names during scans.
    pub seq_dir_pattern: String,

    /// Step names the dispatcher will forward to the handler.
    pub allowed_steps: Vec<String>,

    /// Verbose logging default (overridden by `RUST_LOG`).
    pub debug: bool,

    /// Pause between eligibility checks and permission revocation, letting
    /// in-flight readers finish. Zero is permitted (tests).
    pub grace_secs: u64,

    /// Warn when a held lock marker is older than this many seconds.
    pub lock_stale_warn_secs: u64,

    pub handler: HandlerConfig,
}

/// External step handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HandlerConfig {
    /// Command to execute for a step (e.g. `["dsw-step"]`); the step name,
    /// run directory, and options are appended as arguments.
    pub command: Vec<String>,

    /// Wall-clock budget for one handler invocation, in seconds.
    pub timeout_secs: u64,

    /// Truncate captured handler stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            command: vec!["dsw-step".to_string()],
            timeout_secs: 6 * 60 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            basecall_dir: "/data/basecalls".to_string(),
            seq_dir_pattern: r"^\.seq_".to_string(),
            allowed_steps: vec![
                "archive".to_string(),
                "duplicity".to_string(),
                "filter_data".to_string(),
                "demultiplex".to_string(),
            ],
            debug: false,
            grace_secs: 10,
            lock_stale_warn_secs: 24 * 60 * 60,
            handler: HandlerConfig::default(),
        }
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.basecall_dir.trim().is_empty() {
            return Err(anyhow!("basecall_dir must not be empty"));
        }
        if self.seq_dir_pattern.trim().is_empty() {
            return Err(anyhow!("seq_dir_pattern must not be empty"));
        }
        if self
            .allowed_steps
            .iter()
            .any(|step| step.trim().is_empty())
        {
            return Err(anyhow!("allowed_steps must not contain empty names"));
        }
        if self.handler.command.is_empty() || self.handler.command[0].trim().is_empty() {
            return Err(anyhow!("handler.command must be a non-empty array"));
        }
        if self.handler.timeout_secs == 0 {
            return Err(anyhow!("handler.timeout_secs must be > 0"));
        }
        if self.handler.output_limit_bytes == 0 {
            return Err(anyhow!("handler.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WorkflowConfig::default()`.
pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    if !path
        .try_exists()
        .with_context(|| format!("check config {}", path.display()))?
    {
        let cfg = WorkflowConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WorkflowConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WorkflowConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
