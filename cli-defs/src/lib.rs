//! Shared CLI type definitions for pgdev build and runtime.
//!
//! This crate provides the CLI argument and configuration types used by both
//! the `build.rs` script (for man page generation) and the `pgdev` binary.
//! Keeping them in a separate crate lets the build script render the man page
//! without pulling in the runtime dependencies.

// FIXME: File-wide suppressions are unavoidable here. Clap and OrthoConfig derive macros
// inject generated code throughout the module, and there is no mechanism to narrow
// the scope without restructuring the crate.
#![expect(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![expect(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]

use clap::{Args, Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

/// Container runtime program invoked by default.
pub const DEFAULT_RUNTIME: &str = "docker";
/// Default container name.
pub const DEFAULT_CONTAINER_NAME: &str = "forecast-db";
/// Default image reference.
pub const DEFAULT_IMAGE: &str = "postgres";
/// Default database role created by the image entrypoint.
pub const DEFAULT_USER: &str = "forecast";
/// Default password for [`DEFAULT_USER`].
pub const DEFAULT_PASSWORD: &str = "forecast";
/// Host directory holding the cluster files, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";
/// Account database mounted read-only so the container resolves the host uid.
pub const DEFAULT_PASSWD_FILE: &str = "/etc/passwd";
/// Host port published for the server.
pub const DEFAULT_HOST_PORT: u16 = 5432;

/// Subcommands exposed by `pgdev`. Omitting the subcommand means `up`.
#[derive(Subcommand, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Create the data directory and launch the container.
    Up,
    /// Stop the container; the runtime removes it on exit.
    Down,
    /// Report the container state.
    Status,
    /// Print the connection URL for the launched server.
    Url,
}

impl Commands {
    /// Name of the subcommand as typed on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Status => "status",
            Self::Url => "url",
        }
    }
}

/// Launch configuration shared by every subcommand.
///
/// Values are layered: built-in defaults, then `.pgdev.toml`, then `PGDEV_*`
/// environment variables, then command-line flags.
#[derive(Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[ortho_config(prefix = "PGDEV_")]
pub struct LaunchConfig {
    /// Container runtime program (`docker`, `podman`, ...).
    #[ortho_config(default = DEFAULT_RUNTIME.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_RUNTIME))]
    pub runtime: String,
    /// Container name.
    #[ortho_config(default = DEFAULT_CONTAINER_NAME.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_CONTAINER_NAME))]
    pub name: String,
    /// Image reference to run.
    #[ortho_config(default = DEFAULT_IMAGE.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_IMAGE))]
    pub image: String,
    /// Database superuser created on first start.
    #[ortho_config(default = DEFAULT_USER.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_USER))]
    pub user: String,
    /// Password for the database superuser.
    #[ortho_config(default = DEFAULT_PASSWORD.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_PASSWORD))]
    pub password: String,
    /// Database created on first start; the image uses the user name when unset.
    #[arg(long)]
    pub database: Option<String>,
    /// Host directory mounted as the cluster data directory.
    #[ortho_config(default = DEFAULT_DATA_DIR.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_DATA_DIR))]
    pub data_dir: String,
    /// Host passwd file mounted read-only at `/etc/passwd`.
    #[ortho_config(default = DEFAULT_PASSWD_FILE.to_owned())]
    #[arg(long, default_value_t = String::from(DEFAULT_PASSWD_FILE))]
    pub passwd_file: String,
    /// Numeric uid for the server process; defaults to the invoking user.
    #[arg(long)]
    pub uid: Option<u32>,
    /// Numeric gid for the server process; defaults to the invoking group.
    #[arg(long)]
    pub gid: Option<u32>,
    /// Host port mapped to the container's 5432.
    #[ortho_config(default = DEFAULT_HOST_PORT)]
    #[arg(long, default_value_t = DEFAULT_HOST_PORT)]
    pub port: u16,
    /// Seconds to wait for the published port to open after launch (0 disables).
    ///
    /// An open port is not proof the server accepts sessions yet.
    #[ortho_config(default = 0)]
    #[arg(long, default_value_t = 0)]
    pub wait: u64,
    /// Print the runtime command instead of running it.
    #[ortho_config(default = false)]
    #[arg(long)]
    pub dry_run: bool,
}

/// Top-level CLI entry point consumed by the binary and the man page build.
#[derive(Parser, Deserialize, Serialize, Debug, Clone)]
#[command(name = "pgdev", author, version, about = "Launch a local PostgreSQL container")]
pub struct Cli {
    /// Launch configuration.
    #[command(flatten)]
    pub config: LaunchConfig,
    /// Optional subcommand; defaults to `up`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}
