//! Host data directory preparation.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::debug;

/// Errors raised while preparing the data directory.
#[derive(Debug, Error)]
pub enum DataDirError {
    /// Bind mount sources must be absolute.
    #[error("data directory '{0}' must be absolute")]
    Relative(Utf8PathBuf),
    /// Something other than a directory occupies the path.
    #[error("'{0}' exists and is not a directory")]
    NotADirectory(Utf8PathBuf),
    /// Creating or opening the directory failed.
    #[error("failed to prepare data directory '{path}'")]
    Io {
        /// Directory being prepared.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

/// Create `path` and any missing parents, returning it once it is usable.
///
/// Existing directories are left untouched.
///
/// # Errors
///
/// Returns [`DataDirError`] if `path` is relative, names a non-directory, or
/// cannot be created.
pub fn prepare(path: &Utf8Path) -> Result<Utf8PathBuf, DataDirError> {
    if !path.is_absolute() {
        return Err(DataDirError::Relative(path.to_path_buf()));
    }
    if path.exists() && !path.is_dir() {
        return Err(DataDirError::NotADirectory(path.to_path_buf()));
    }
    Dir::create_ambient_dir_all(path, ambient_authority()).map_err(|source| DataDirError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // Opening proves the directory is traversable by the invoking user.
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|source| DataDirError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(%path, "data directory ready");
    Ok(path.to_path_buf())
}
