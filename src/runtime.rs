//! Container runtime seam.
//!
//! [`ContainerRuntime`] abstracts the three runtime calls `pgdev` makes so the
//! launcher can be exercised without a daemon. [`CliRuntime`] drives a
//! Docker-compatible command-line client.

use std::{fmt, io, process::ExitStatus};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::container::{ContainerSpec, redact};

/// Failures reported by a container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime program could not be found on `PATH`.
    #[error("container runtime '{0}' is not installed or not on PATH")]
    NotInstalled(String),
    /// The runtime exited unsuccessfully.
    #[error("'{program} {command}' failed ({status}): {stderr}")]
    Failed {
        /// Runtime program.
        program: String,
        /// Runtime subcommand that failed.
        command: String,
        /// Exit status.
        status: ExitStatus,
        /// Trimmed standard error.
        stderr: String,
    },
    /// The runtime produced output that could not be interpreted.
    #[error("unexpected output from '{program}': {detail}")]
    UnexpectedOutput {
        /// Runtime program.
        program: String,
        /// What was wrong with it.
        detail: String,
    },
    /// Spawning or waiting on the runtime failed.
    #[error("failed to invoke '{program}'")]
    Io {
        /// Runtime program.
        program: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

/// State of a named container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// Running.
    Running,
    /// Paused.
    Paused,
    /// Restarting.
    Restarting,
    /// Stopped but not yet removed.
    Exited,
    /// Any other runtime-specific state.
    Other(String),
    /// No container with that name exists.
    Missing,
}

impl ContainerState {
    /// Map a runtime status string onto a state.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "created" | "configured" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "exited" | "stopped" | "dead" => Self::Exited,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether the container is up or coming up.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Restarting | Self::Paused)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Paused => f.write_str("paused"),
            Self::Restarting => f.write_str("restarting"),
            Self::Exited => f.write_str("exited"),
            Self::Other(s) => f.write_str(s),
            Self::Missing => f.write_str("not found"),
        }
    }
}

/// Result of asking the runtime to stop a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The container was stopped.
    Stopped,
    /// There was nothing to stop.
    Missing,
}

/// Operations `pgdev` performs against a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Program name used in messages.
    fn program(&self) -> &str;

    /// Launch `spec`, returning the container id the runtime printed.
    async fn run(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Stop the container called `name`.
    async fn stop(&self, name: &str) -> Result<StopOutcome, RuntimeError>;

    /// Report the state of the container called `name`.
    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError>;
}

/// Docker-compatible command-line runtime (`docker`, `podman`, `nerdctl`).
#[derive(Debug, Clone)]
pub struct CliRuntime {
    program: String,
}

#[derive(Deserialize)]
struct StateDoc {
    #[serde(rename = "Status")]
    status: String,
}

struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl CliRuntime {
    /// Drive `program`, resolved through `PATH`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn exec(&self, args: &[String]) -> Result<Captured, RuntimeError> {
        debug!(program = %self.program, args = ?redact(args), "invoking container runtime");
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    RuntimeError::NotInstalled(self.program.clone())
                } else {
                    RuntimeError::Io {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;
        Ok(Captured {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }

    fn failure(&self, command: &str, captured: Captured) -> RuntimeError {
        RuntimeError::Failed {
            program: self.program.clone(),
            command: command.to_owned(),
            status: captured.status,
            stderr: captured.stderr,
        }
    }
}

/// Whether runtime stderr says the named container does not exist.
#[must_use]
pub fn reports_missing(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no such container")
        || lower.contains("no such object")
        || lower.contains("no container with name or id")
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        info!(command = %spec.display_command(&self.program), "launching container");
        let captured = self.exec(&spec.run_args()).await?;
        if !captured.status.success() {
            return Err(self.failure("run", captured));
        }
        // Detached runs print the container id as the last line, after any pull progress.
        let id = captured
            .stdout
            .lines()
            .last()
            .unwrap_or_default()
            .trim()
            .to_owned();
        info!(container = %spec.name, %id, "container started");
        Ok(id)
    }

    async fn stop(&self, name: &str) -> Result<StopOutcome, RuntimeError> {
        let captured = self.exec(&["stop".to_owned(), name.to_owned()]).await?;
        if captured.status.success() {
            info!(container = %name, "container stopped");
            return Ok(StopOutcome::Stopped);
        }
        if reports_missing(&captured.stderr) {
            return Ok(StopOutcome::Missing);
        }
        Err(self.failure("stop", captured))
    }

    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        let args = [
            "inspect".to_owned(),
            "--type".to_owned(),
            "container".to_owned(),
            "--format".to_owned(),
            "{{json .State}}".to_owned(),
            name.to_owned(),
        ];
        let captured = self.exec(&args).await?;
        if !captured.status.success() {
            if reports_missing(&captured.stderr) {
                return Ok(ContainerState::Missing);
            }
            return Err(self.failure("inspect", captured));
        }
        parse_state(&captured.stdout).map_err(|detail| RuntimeError::UnexpectedOutput {
            program: self.program.clone(),
            detail,
        })
    }
}

/// Parse the `{{json .State}}` document printed by `inspect`.
///
/// # Errors
///
/// Returns a description of the problem if `raw` is not a state document.
pub fn parse_state(raw: &str) -> Result<ContainerState, String> {
    let doc: StateDoc = serde_json::from_str(raw.trim()).map_err(|e| e.to_string())?;
    Ok(ContainerState::from_status(&doc.status))
}

#[cfg(all(unix, any(test, feature = "test-support")))]
pub use recording::RecordingRuntime;

// Scripted failures carry a real `ExitStatus`, which only unix can fabricate.
#[cfg(all(unix, any(test, feature = "test-support")))]
mod recording {
    //! In-memory runtime used by tests.

    use std::{
        collections::HashMap,
        os::unix::process::ExitStatusExt,
        sync::{Mutex, MutexGuard, PoisonError},
    };

    use super::{
        ContainerRuntime,
        ContainerSpec,
        ContainerState,
        ExitStatus,
        RuntimeError,
        StopOutcome,
        async_trait,
    };

    /// Runtime double that records every call and tracks container states.
    #[derive(Debug, Default)]
    pub struct RecordingRuntime {
        calls: Mutex<Vec<Vec<String>>>,
        states: Mutex<HashMap<String, ContainerState>>,
        run_failure: Mutex<Option<String>>,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failed_status() -> ExitStatus {
        ExitStatus::from_raw(125 << 8)
    }

    impl RecordingRuntime {
        /// Create a runtime with no containers.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Pretend `name` is already running.
        #[must_use]
        pub fn with_running(self, name: &str) -> Self {
            self.with_state(name, ContainerState::Running)
        }

        /// Pretend a container called `name` exists in `state`.
        #[must_use]
        pub fn with_state(self, name: &str, state: ContainerState) -> Self {
            lock(&self.states).insert(name.to_owned(), state);
            self
        }

        /// Make the next `run` fail with `stderr`.
        #[must_use]
        pub fn failing_run(self, stderr: &str) -> Self {
            *lock(&self.run_failure) = Some(stderr.to_owned());
            self
        }

        /// Every argv received so far, without the program name.
        #[must_use]
        pub fn calls(&self) -> Vec<Vec<String>> {
            lock(&self.calls).clone()
        }

        fn record(&self, args: Vec<String>) {
            lock(&self.calls).push(args);
        }
    }

    #[async_trait]
    impl ContainerRuntime for RecordingRuntime {
        fn program(&self) -> &str {
            "recording"
        }

        async fn run(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
            self.record(spec.run_args());
            if let Some(stderr) = lock(&self.run_failure).take() {
                return Err(RuntimeError::Failed {
                    program: self.program().to_owned(),
                    command: "run".to_owned(),
                    status: failed_status(),
                    stderr,
                });
            }
            lock(&self.states).insert(spec.name.clone(), ContainerState::Running);
            Ok(format!("{}-id", spec.name))
        }

        async fn stop(&self, name: &str) -> Result<StopOutcome, RuntimeError> {
            self.record(vec!["stop".to_owned(), name.to_owned()]);
            if lock(&self.states).remove(name).is_some() {
                Ok(StopOutcome::Stopped)
            } else {
                Ok(StopOutcome::Missing)
            }
        }

        async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError> {
            self.record(vec!["inspect".to_owned(), name.to_owned()]);
            Ok(lock(&self.states)
                .get(name)
                .cloned()
                .unwrap_or(ContainerState::Missing))
        }
    }
}
