//! The `pgdev` operations: `up`, `down`, `status` and `url`.
//!
//! Each operation returns an [`Outcome`] describing what happened; printing
//! is left to the caller so the operations stay testable.

use std::{fmt, net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use tracing::{info, warn};
use url::Url;

use crate::{
    config::{self, Commands, ConfigError, LaunchConfig},
    container::{ContainerSpec, UserSpec},
    data_dir,
    readiness::wait_for_port,
    runtime::{ContainerRuntime, ContainerState, StopOutcome},
};

/// What an operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was executed; this is the command that would have run.
    DryRun(String),
    /// The container was launched.
    Started {
        /// Container name.
        name: String,
        /// Id printed by the runtime.
        id: String,
        /// Whether the published port accepted a TCP connection. This does not
        /// prove the server is up: a runtime proxy may hold the port first.
        ready: bool,
    },
    /// A container with the configured name was already up.
    AlreadyRunning(String),
    /// The container was stopped.
    Stopped(String),
    /// There was no container to stop.
    NotRunning(String),
    /// Current container state.
    Status {
        /// Container name.
        name: String,
        /// Reported state.
        state: ContainerState,
    },
    /// Connection URL for the server.
    Url(Url),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DryRun(command) => f.write_str(command),
            Self::Started { name, id, ready } => {
                write!(f, "started {name} ({id})")?;
                if *ready {
                    f.write_str(", port open")?;
                }
                Ok(())
            }
            Self::AlreadyRunning(name) => write!(f, "{name} is already running"),
            Self::Stopped(name) => write!(f, "stopped {name}"),
            Self::NotRunning(name) => write!(f, "{name} is not running"),
            Self::Status { name, state } => write!(f, "{name}: {state}"),
            Self::Url(url) => f.write_str(url.as_str()),
        }
    }
}

/// A launch configuration bound to a working directory and host identity.
#[derive(Debug, Clone)]
pub struct Launch {
    /// Layered configuration.
    pub config: LaunchConfig,
    /// Directory relative data paths are resolved against.
    pub cwd: Utf8PathBuf,
    /// Default identity for the server process.
    pub ids: UserSpec,
}

impl Launch {
    /// Bind `config` to the process working directory and real uid/gid.
    ///
    /// # Errors
    ///
    /// Fails if the working directory cannot be read or is not UTF-8.
    pub fn from_process(config: LaunchConfig) -> Result<Self> {
        let raw_cwd = std::env::current_dir().context("failed to read working directory")?;
        let cwd = Utf8PathBuf::from_path_buf(raw_cwd).map_err(|_| ConfigError::NonUtf8Cwd)?;
        Ok(Self {
            config,
            cwd,
            ids: config::host_ids(),
        })
    }

    /// Resolved container description.
    ///
    /// # Errors
    ///
    /// Propagates [`ConfigError`] from validation.
    pub fn spec(&self) -> Result<ContainerSpec, ConfigError> {
        config::resolve(&self.config, &self.cwd, self.ids)
    }

    /// Run `command` against `runtime`.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the selected operation.
    pub async fn execute(
        &self,
        command: Commands,
        runtime: &dyn ContainerRuntime,
    ) -> Result<Outcome> {
        match command {
            Commands::Up => self.up(runtime).await,
            Commands::Down => self.down(runtime).await,
            Commands::Status => self.status(runtime).await,
            Commands::Url => self.url(),
        }
    }

    /// Create the data directory and launch the container.
    ///
    /// A container already running under the configured name is left alone.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, when the data directory cannot be
    /// prepared, when the runtime rejects the launch, or when the server does
    /// not come up within the configured wait.
    pub async fn up(&self, runtime: &dyn ContainerRuntime) -> Result<Outcome> {
        let spec = self.spec()?;
        if self.config.dry_run {
            return Ok(Outcome::DryRun(spec.display_command(runtime.program())));
        }

        if let Some(dir) = spec.data_dir() {
            data_dir::prepare(dir)?;
        }

        let state = runtime
            .inspect(&spec.name)
            .await
            .with_context(|| format!("failed to inspect container '{}'", spec.name))?;
        if state.is_active() {
            info!(container = %spec.name, %state, "container already up; not launching");
            return Ok(Outcome::AlreadyRunning(spec.name));
        }

        let id = runtime
            .run(&spec)
            .await
            .with_context(|| format!("failed to launch container '{}'", spec.name))?;

        let ready = if self.config.wait > 0 {
            let addr = SocketAddr::from(([127, 0, 0, 1], spec.port.host));
            wait_for_port(addr, Duration::from_secs(self.config.wait))
                .await
                .with_context(|| format!("container '{}' started but is not ready", spec.name))?;
            true
        } else {
            false
        };

        Ok(Outcome::Started {
            name: spec.name,
            id,
            ready,
        })
    }

    /// Stop the container; the runtime removes it because it runs with `--rm`.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when the runtime cannot stop it.
    pub async fn down(&self, runtime: &dyn ContainerRuntime) -> Result<Outcome> {
        let name = self.spec()?.name;
        if self.config.dry_run {
            return Ok(Outcome::DryRun(format!("{} stop {name}", runtime.program())));
        }
        match runtime
            .stop(&name)
            .await
            .with_context(|| format!("failed to stop container '{name}'"))?
        {
            StopOutcome::Stopped => Ok(Outcome::Stopped(name)),
            StopOutcome::Missing => {
                warn!(container = %name, "no container to stop");
                Ok(Outcome::NotRunning(name))
            }
        }
    }

    /// Report the container state.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when the runtime cannot be queried.
    pub async fn status(&self, runtime: &dyn ContainerRuntime) -> Result<Outcome> {
        let name = self.spec()?.name;
        let state = runtime
            .inspect(&name)
            .await
            .with_context(|| format!("failed to inspect container '{name}'"))?;
        Ok(Outcome::Status { name, state })
    }

    /// Connection URL for the configured server.
    ///
    /// # Errors
    ///
    /// Propagates [`ConfigError`] if the URL cannot be built.
    pub fn url(&self) -> Result<Outcome> {
        Ok(Outcome::Url(config::connection_url(&self.config)?))
    }
}
