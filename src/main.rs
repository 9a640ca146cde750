//! Killer CLI entry point.
//!
//! Provides `start`, `check`, and `inspect` subcommands for running the
//! guard, evaluating the policy once without enforcing it, or listing what
//! each channel currently detects.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use killer::config::{killer_paths, load_config, KillerConfig};
use killer::guard::{Guard, GuardExit, Verdict};
use killer::inspect::{self, SysRoots};
use killer::kill::KillTrigger;
use killer::probes::host_probes;

/// Powers the host off when its peripherals or power state change.
#[derive(Parser)]
#[command(name = "killer", version, about)]
struct Cli {
    /// Path to killer.toml (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the guard until a violation powers the host off.
    Start,
    /// Evaluate the policy once and report, without powering off.
    Check,
    /// List what each channel currently detects, ignoring the policy.
    Inspect {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start => handle_start(cli.config).await,
        Command::Check => handle_check(cli.config).await,
        Command::Inspect { json } => handle_inspect(json).await,
    }
}

/// Resolve and load the configuration.
fn resolve_config(explicit: Option<PathBuf>) -> anyhow::Result<(PathBuf, KillerConfig)> {
    let path = match explicit {
        Some(path) => path,
        None => killer_paths()?.config_toml,
    };
    let config =
        load_config(&path).with_context(|| format!("failed to load {}", path.display()))?;
    Ok((path, config))
}

/// Run the guard daemon.
async fn handle_start(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let paths = killer_paths()?;

    // Set up production logging (JSON file + stderr).
    let _logging_guard = killer::logging::init_production(&paths.logs_dir)?;

    let (config_path, config) = resolve_config(config_path)?;
    let policy = Arc::new(config.linux);
    let probes = host_probes(config.guard.probe_timeout());
    let mut guard = Guard::new(policy, probes, KillTrigger::system());

    info!(
        config = %config_path.display(),
        interval_secs = config.guard.interval_secs,
        channels = ?guard.channels(),
        "killer guard started"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let exit = match guard.run(config.guard.interval(), shutdown).await {
        Ok(exit) => exit,
        Err(e) => {
            error!(error = %e, "guard stopped on fatal error");
            return Err(e.into());
        }
    };

    match exit {
        GuardExit::KillIssued(violation) => {
            info!(reason = %violation.reason, "guard stopped after kill trigger");
        }
        GuardExit::Interrupted => info!("guard stopped by signal"),
    }

    Ok(())
}

/// Evaluate the policy once without enforcing it.
async fn handle_check(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    killer::logging::init_cli();

    let (config_path, config) = resolve_config(config_path)?;
    let policy = Arc::new(config.linux);
    let probes = host_probes(config.guard.probe_timeout());
    let guard = Guard::new(policy, probes, KillTrigger::system());

    info!(config = %config_path.display(), channels = ?guard.channels(), "checking policy");

    match guard.evaluate().await? {
        Verdict::Clean => {
            info!("no violations detected");
            Ok(())
        }
        Verdict::Violation(violation) => {
            let observation = serde_json::to_string(&violation.observation)
                .context("failed to serialize observation")?;
            warn!(
                channel = %violation.channel,
                reason = %violation.reason,
                observation = %observation,
                "violation detected (not enforced)"
            );
            anyhow::bail!("policy violated: {}", violation.reason)
        }
    }
}

/// Print the diagnostic inventory.
async fn handle_inspect(json: bool) -> anyhow::Result<()> {
    killer::logging::init_cli();

    let probes = host_probes(killer::config::GuardConfig::default().probe_timeout());
    let inventory = inspect::collect(&probes, &SysRoots::default()).await;

    if json {
        let rendered =
            serde_json::to_string_pretty(&inventory).context("failed to serialize inventory")?;
        println!("{rendered}");
    } else {
        print!("{}", inventory.render());
    }

    Ok(())
}
