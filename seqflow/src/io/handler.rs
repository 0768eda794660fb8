//! External step handler seam.
//!
//! The [`StepHandler`] trait decouples the dispatcher from whatever actually
//! performs a workflow step (rsync, archiving, demultiplexing, ...). The
//! production implementation spawns a configured command; tests use scripted
//! handlers that record calls without spawning processes. The handler's own
//! success or failure is opaque here beyond "did it error".

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Parameters for one step invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRequest {
    /// Run directory the step operates on.
    pub run_dir: PathBuf,
    /// Validated step name.
    pub step: String,
    /// Optional key-value parameters forwarded verbatim.
    pub options: BTreeMap<String, String>,
    /// Maximum time to wait for the handler to complete.
    pub timeout: Duration,
    /// Truncate captured handler output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over step execution backends.
pub trait StepHandler {
    /// Perform the step. Any `Err` is treated as a step failure upstream.
    fn run(&self, request: &StepRequest) -> Result<()>;
}

/// Handler that spawns a configured command.
///
/// The command line is `argv... <step> <run_dir> [--opt key=value]...`.
pub struct ProcessStepHandler {
    command: Vec<String>,
}

impl ProcessStepHandler {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl StepHandler for ProcessStepHandler {
    fn run(&self, request: &StepRequest) -> Result<()> {
        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("handler command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..])
            .arg(&request.step)
            .arg(&request.run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &request.options {
            cmd.arg("--opt").arg(format!("{key}={value}"));
        }

        debug!(step = %request.step, program = %program, "spawning step handler");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn step handler {program}"))?;

        // Both pipes are drained concurrently while the child runs; waiting
        // first would deadlock once the child fills a pipe buffer.
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        let limit = request.output_limit_bytes;
        let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
        let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

        let mut timed_out = false;
        let status = match child
            .wait_timeout(request.timeout)
            .context("wait for step handler")?
        {
            Some(status) => status,
            None => {
                warn!(
                    step = %request.step,
                    timeout_secs = request.timeout.as_secs(),
                    "step handler timed out, killing"
                );
                timed_out = true;
                child.kill().context("kill step handler")?;
                child.wait().context("wait step handler after kill")?
            }
        };

        let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
        let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;
        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(
                step = %request.step,
                stdout_truncated,
                stderr_truncated,
                "step handler output truncated"
            );
        }

        if timed_out {
            return Err(anyhow!(
                "step handler for '{}' timed out after {:?}",
                request.step,
                request.timeout
            ));
        }
        if !status.success() {
            return Err(anyhow!(
                "step handler for '{}' exited with status {:?}:\n{}{}",
                request.step,
                status.code(),
                String::from_utf8_lossy(&stderr),
                truncated_notice(stderr_truncated)
            ));
        }

        debug!(stdout_bytes = stdout.len(), "step handler stdout captured");
        info!(step = %request.step, "step handler completed");
        Ok(())
    }
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read step handler output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

fn truncated_notice(truncated: usize) -> String {
    if truncated > 0 {
        format!("\n[truncated {truncated} bytes]")
    } else {
        String::new()
    }
}
