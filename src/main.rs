//! Creates a local data directory and launches a PostgreSQL container.
//!
//! Configuration comes from `.pgdev.toml`, `PGDEV_*` environment variables and
//! command-line flags. The binary exits with status code `0` on success and
//! `1` on error.

#![expect(clippy::print_stderr, reason = "top-level error report")]

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match pgdev::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pgdev: {e:#}");
            ExitCode::FAILURE
        }
    }
}
