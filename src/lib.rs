//! Core library for `pgdev`, a launcher for a local development PostgreSQL
//! container.
//!
//! The binary creates a host data directory and starts the official image
//! through a Docker-compatible runtime with a fixed argument shape. The
//! pieces are exposed here so the argv, the directory handling and the
//! operations can be tested without a daemon.

#![expect(
    clippy::print_stdout,
    reason = "intentional user output for CLI commands"
)]

pub mod config;
pub mod container;
pub mod data_dir;
pub mod launcher;
pub mod logging;
pub mod readiness;
pub mod runtime;

use std::ffi::OsString;

use anyhow::{Context, Result};
use clap::Parser;
use ortho_config::OrthoConfig;

pub use crate::config::{Cli, Commands, LaunchConfig};
use crate::{
    launcher::{Launch, Outcome},
    runtime::CliRuntime,
};

/// Configuration and subcommand resolved from argv, files and environment.
#[derive(Debug, Clone)]
pub struct ResolvedCli {
    /// Layered launch configuration.
    pub config: LaunchConfig,
    /// Requested operation.
    pub command: Commands,
}

/// Parse `args` and layer the configuration sources beneath the flags.
///
/// The subcommand, when present, is the last argument since none of them take
/// arguments; it is stripped before handing the flags to the config loader.
///
/// # Errors
///
/// Returns an error if the configuration sources cannot be merged.
pub fn load_cli<I, T>(args: I) -> Result<ResolvedCli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut argv: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let cli = Cli::parse_from(&argv);
    if let Some(command) = cli.command
        && argv.last().is_some_and(|arg| arg == command.name())
    {
        argv.pop();
    }
    let config = LaunchConfig::load_from_iter(argv).context("failed to load configuration")?;
    Ok(ResolvedCli {
        config,
        command: cli.command.unwrap_or(Commands::Up),
    })
}

/// Execute a resolved command against the configured runtime program.
///
/// # Errors
///
/// Propagates any failure of the selected operation.
pub async fn run_with_cli(cli: ResolvedCli) -> Result<Outcome> {
    let ResolvedCli { config, command } = cli;
    let runtime = CliRuntime::new(config.runtime.clone());
    let launch = Launch::from_process(config)?;
    launch.execute(command, &runtime).await
}

/// Parse the process arguments, run the requested operation and print its
/// outcome.
///
/// # Errors
///
/// Returns any error emitted while loading configuration or running the
/// operation.
pub async fn run() -> Result<()> {
    logging::init_tracing();
    let cli = load_cli(std::env::args_os())?;
    let outcome = run_with_cli(cli).await?;
    println!("{outcome}");
    Ok(())
}
