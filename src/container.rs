//! Typed description of the container launched by `pgdev`.
//!
//! A [`ContainerSpec`] is produced by [`crate::config::resolve`] and turned
//! into the runtime's `run` argument vector here. The argv is a pure function
//! of the description, so tests assert on the exact invocation without a
//! container runtime.

use camino::Utf8PathBuf;

/// Port the server listens on inside the container.
pub const CONTAINER_PORT: u16 = 5432;
/// Cluster directory used by the official image.
pub const CONTAINER_DATA_DIR: &str = "/var/lib/postgresql/data";
/// Mount point for the host passwd file.
pub const CONTAINER_PASSWD_FILE: &str = "/etc/passwd";

const REDACTED: &str = "********";
const SECRET_ENV: &str = "POSTGRES_PASSWORD";

/// Bind mount from the host into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Absolute host path.
    pub source: Utf8PathBuf,
    /// Path inside the container.
    pub target: String,
    /// Mount read-only.
    pub read_only: bool,
}

impl Mount {
    fn to_arg(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.source, self.target)
        } else {
            format!("{}:{}", self.source, self.target)
        }
    }
}

/// Numeric user and group the server process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSpec {
    /// Numeric user id.
    pub uid: u32,
    /// Numeric group id.
    pub gid: u32,
}

/// Host-to-container TCP port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port published on the host.
    pub host: u16,
    /// Port inside the container.
    pub container: u16,
}

/// Fully resolved container launch description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name passed to `--name`.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment passed with `--env`, in order.
    pub env: Vec<(String, String)>,
    /// Bind mounts passed with `--volume`, in order.
    pub mounts: Vec<Mount>,
    /// Process identity passed with `--user`.
    pub user: UserSpec,
    /// Published port.
    pub port: PortMapping,
    /// Run in the background.
    pub detach: bool,
    /// Remove the container once it exits.
    pub auto_remove: bool,
}

impl ContainerSpec {
    /// Host directory mounted as the cluster data directory, if any.
    #[must_use]
    pub fn data_dir(&self) -> Option<&Utf8PathBuf> {
        self.mounts
            .iter()
            .find(|m| m.target == CONTAINER_DATA_DIR)
            .map(|m| &m.source)
    }

    /// Arguments for `<runtime> run ...`, starting with `run`.
    #[must_use]
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_owned()];
        if self.detach {
            args.push("--detach".to_owned());
        }
        if self.auto_remove {
            args.push("--rm".to_owned());
        }
        args.push("--name".to_owned());
        args.push(self.name.clone());
        for (key, value) in &self.env {
            args.push("--env".to_owned());
            args.push(format!("{key}={value}"));
        }
        for mount in &self.mounts {
            args.push("--volume".to_owned());
            args.push(mount.to_arg());
        }
        args.push("--user".to_owned());
        args.push(format!("{}:{}", self.user.uid, self.user.gid));
        args.push("--publish".to_owned());
        args.push(format!("{}:{}", self.port.host, self.port.container));
        args.push(self.image.clone());
        args
    }

    /// Shell-quoted rendering of the full command with the password redacted.
    #[must_use]
    pub fn display_command(&self, program: &str) -> String {
        let mut line = quote(program);
        for arg in redact(&self.run_args()) {
            line.push(' ');
            line.push_str(&quote(&arg));
        }
        line
    }
}

/// Copy of `args` with the `POSTGRES_PASSWORD` value masked, for logging.
#[must_use]
pub fn redact(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((SECRET_ENV, _)) => format!("{SECRET_ENV}={REDACTED}"),
            _ => arg.clone(),
        })
        .collect()
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
