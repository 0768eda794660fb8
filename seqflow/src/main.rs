//! Sequencing run-directory lifecycle CLI.
//!
//! Invoked periodically (cron-style) with a step name or `forbid`. Multiple
//! invocations may race on the same run directory; coordination happens
//! through marker files, so every command maps expected no-op conditions to
//! exit code 0 and reserves non-zero codes for illegal steps and real I/O
//! failures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use seqflow::core::run_dir::RunDirectory;
use seqflow::dispatch::{self, IllegalStepError};
use seqflow::exit_codes;
use seqflow::forbid;
use seqflow::io::config::{WorkflowConfig, load_config};
use seqflow::io::handler::ProcessStepHandler;
use seqflow::io::scan::discover_runs;
use seqflow::logging;

const DEFAULT_CONFIG_PATH: &str = "/etc/seqflow/workflow.toml";

#[derive(Parser)]
#[command(
    name = "seqflow",
    version,
    about = "Sequencing run-directory lifecycle manager"
)]
struct Cli {
    /// Path to the workflow config file (defaults apply when missing).
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the workflow for one run directory from the given step.
    Run {
        /// Step name (must be in the configured allow-list).
        step: String,

        /// Run directory to operate on.
        #[arg(long)]
        run_dir: PathBuf,

        /// Step parameter, repeatable (`--opt key=value`).
        #[arg(long = "opt", value_parser = parse_key_val)]
        options: Vec<(String, String)>,
    },
    /// Revoke access to one completed run directory.
    Forbid {
        /// Run directory to operate on.
        #[arg(long)]
        run_dir: PathBuf,
    },
    /// Apply a step (or `forbid`) to every run directory under the
    /// configured basecall dir.
    Scan {
        /// Step name, or `forbid` for the access-revocation pass.
        step: String,

        /// Step parameter, repeatable (`--opt key=value`).
        #[arg(long = "opt", value_parser = parse_key_val)]
        options: Vec<(String, String)>,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn main() {
    let cli = Cli::parse();

    let cfg = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::FAILURE);
        }
    };
    logging::init(cfg.debug);

    if let Err(err) = run(cli.command, &cfg) {
        let code = if err.downcast_ref::<IllegalStepError>().is_some() {
            exit_codes::USAGE
        } else {
            exit_codes::FAILURE
        };
        let chain = format!("{err:#}");
        error!(host = %cfg.hostname, err = %chain, "seqflow failed");
        process::exit(code);
    }
}

fn run(command: Command, cfg: &WorkflowConfig) -> Result<()> {
    match command {
        Command::Run {
            step,
            run_dir,
            options,
        } => {
            let run = RunDirectory::new(run_dir)?;
            let handler = ProcessStepHandler::new(cfg.handler.command.clone());
            let options: BTreeMap<String, String> = options.into_iter().collect();
            dispatch::run_from(&run, cfg, &handler, &step, &options)?;
            Ok(())
        }
        Command::Forbid { run_dir } => {
            let run = RunDirectory::new(run_dir)?;
            forbid::forbid(&run, cfg)?;
            Ok(())
        }
        Command::Scan { step, options } => scan(cfg, &step, &options.into_iter().collect()),
    }
}

/// Walk every discovered run directory, applying `forbid` or a workflow
/// step. A failing run does not stop the sweep; failures are logged per
/// run and surfaced once at the end, so one broken directory cannot
/// starve the rest of the machine's runs. An illegal step name aborts
/// immediately since it would fail identically for every run.
fn scan(cfg: &WorkflowConfig, step: &str, options: &BTreeMap<String, String>) -> Result<()> {
    let runs = discover_runs(Path::new(&cfg.basecall_dir), &cfg.seq_dir_pattern)?;
    info!(host = %cfg.hostname, step, runs = runs.len(), "scan start");

    let handler = ProcessStepHandler::new(cfg.handler.command.clone());
    let mut failed = 0usize;
    for run in &runs {
        // The forbid pass runs as its own faster cron job; keeping it out of
        // the dispatcher means less log noise per run.
        let result = if step == "forbid" {
            forbid::forbid(run, cfg).map(|_| ())
        } else {
            dispatch::run_from(run, cfg, &handler, step, options).map(|_| ())
        };
        if let Err(err) = result {
            if err.downcast_ref::<IllegalStepError>().is_some() {
                return Err(err);
            }
            failed += 1;
            let chain = format!("{err:#}");
            error!(
                host = %cfg.hostname,
                run = %run.run_name(),
                err = %chain,
                "run failed, continuing scan"
            );
        }
    }

    info!(host = %cfg.hostname, step, failed, "scan end");
    if failed > 0 {
        return Err(anyhow!("{failed} of {} runs failed", runs.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_options() {
        let cli = Cli::parse_from([
            "seqflow",
            "run",
            "archive",
            "--run-dir",
            "/data/basecalls/.seq_M1/run42",
            "--opt",
            "lanes=1-4",
        ]);
        match cli.command {
            Command::Run { step, options, .. } => {
                assert_eq!(step, "archive");
                assert_eq!(options, vec![("lanes".to_string(), "1-4".to_string())]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_forbid() {
        let cli = Cli::parse_from(["seqflow", "forbid", "--run-dir", "/data/run42"]);
        assert!(matches!(cli.command, Command::Forbid { .. }));
    }

    #[test]
    fn rejects_malformed_option() {
        assert!(parse_key_val("no-equals").is_err());
        assert!(parse_key_val("=value").is_err());
        assert_eq!(
            parse_key_val("key=a=b").expect("split at first equals"),
            ("key".to_string(), "a=b".to_string())
        );
    }
}
