//! Resolution of a layered [`LaunchConfig`] into a [`ContainerSpec`].
//!
//! Resolution is pure: the working directory and the invoking user's ids are
//! passed in so the same configuration always yields the same argv.

use camino::{Utf8Path, Utf8PathBuf};
pub use cli_defs::{Cli, Commands, LaunchConfig};
use thiserror::Error;
use url::Url;

use crate::container::{
    CONTAINER_DATA_DIR,
    CONTAINER_PASSWD_FILE,
    CONTAINER_PORT,
    ContainerSpec,
    Mount,
    PortMapping,
    UserSpec,
};

const MAX_NAME_LEN: usize = 128;

/// Validation failures raised while resolving configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required string setting is blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// The container name is not accepted by container runtimes.
    #[error("invalid container name '{0}': use [a-zA-Z0-9][a-zA-Z0-9_.-]*")]
    InvalidName(String),
    /// Port 0 cannot be published.
    #[error("host port must be between 1 and 65535")]
    InvalidPort,
    /// Bind mount sources must be absolute.
    #[error("passwd file '{0}' must be an absolute path")]
    RelativePasswdFile(String),
    /// The working directory is not valid UTF-8.
    #[error("working directory is not valid UTF-8")]
    NonUtf8Cwd,
    /// The connection URL could not be assembled.
    #[error("cannot build connection URL: {0}")]
    Url(String),
}

/// Real uid and gid of the invoking process.
#[must_use]
pub fn host_ids() -> UserSpec {
    UserSpec {
        uid: nix::unistd::getuid().as_raw(),
        gid: nix::unistd::getgid().as_raw(),
    }
}

/// Resolve `cfg` against `cwd` and the invoking user's `ids`.
///
/// # Errors
///
/// Returns [`ConfigError`] when a setting fails validation.
pub fn resolve(
    cfg: &LaunchConfig,
    cwd: &Utf8Path,
    ids: UserSpec,
) -> Result<ContainerSpec, ConfigError> {
    validate_name(&cfg.name)?;
    require("image", &cfg.image)?;
    require("user", &cfg.user)?;
    require("data_dir", &cfg.data_dir)?;
    if cfg.port == 0 {
        return Err(ConfigError::InvalidPort);
    }
    let passwd = Utf8PathBuf::from(&cfg.passwd_file);
    if !passwd.is_absolute() {
        return Err(ConfigError::RelativePasswdFile(cfg.passwd_file.clone()));
    }

    let mut env = vec![
        ("POSTGRES_USER".to_owned(), cfg.user.clone()),
        ("POSTGRES_PASSWORD".to_owned(), cfg.password.clone()),
    ];
    if let Some(db) = cfg.database.as_deref().filter(|d| !d.trim().is_empty()) {
        env.push(("POSTGRES_DB".to_owned(), db.to_owned()));
    }

    Ok(ContainerSpec {
        name: cfg.name.clone(),
        image: cfg.image.clone(),
        env,
        mounts: vec![
            Mount {
                source: absolute(cwd, &cfg.data_dir),
                target: CONTAINER_DATA_DIR.to_owned(),
                read_only: false,
            },
            Mount {
                source: passwd,
                target: CONTAINER_PASSWD_FILE.to_owned(),
                read_only: true,
            },
        ],
        user: UserSpec {
            uid: cfg.uid.unwrap_or(ids.uid),
            gid: cfg.gid.unwrap_or(ids.gid),
        },
        port: PortMapping {
            host: cfg.port,
            container: CONTAINER_PORT,
        },
        detach: true,
        auto_remove: true,
    })
}

/// Connection URL for the server described by `cfg`.
///
/// The database defaults to the user name, as the image entrypoint does.
///
/// # Errors
///
/// Returns [`ConfigError::Url`] if the credentials cannot be encoded.
pub fn connection_url(cfg: &LaunchConfig) -> Result<Url, ConfigError> {
    require("user", &cfg.user)?;
    let db = cfg
        .database
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(&cfg.user);
    let rejected = |()| ConfigError::Url("URL cannot carry credentials".to_owned());
    let mut url =
        Url::parse("postgres://localhost").map_err(|e| ConfigError::Url(e.to_string()))?;
    url.set_port(Some(cfg.port)).map_err(rejected)?;
    url.set_username(&cfg.user).map_err(rejected)?;
    url.set_password(Some(&cfg.password)).map_err(rejected)?;
    url.path_segments_mut()
        .map_err(|()| ConfigError::Url("URL cannot carry a path".to_owned()))?
        .push(db);
    url.query_pairs_mut().append_pair("sslmode", "disable");
    Ok(url)
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty(field))
    } else {
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    require("name", name)?;
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if first_ok && rest_ok && name.len() <= MAX_NAME_LEN {
        Ok(())
    } else {
        Err(ConfigError::InvalidName(name.to_owned()))
    }
}

fn absolute(cwd: &Utf8Path, path: &str) -> Utf8PathBuf {
    let candidate = Utf8Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        cwd.join(candidate)
    }
}
