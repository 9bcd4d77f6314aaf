//! Readiness checks for the launched server.

use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::{net::TcpStream, time::timeout};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Failure to observe a listening port in time.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{addr} did not accept connections within {waited:?}")]
pub struct ReadinessError {
    /// Address that was polled.
    pub addr: SocketAddr,
    /// Time spent waiting.
    pub waited: Duration,
}

/// Wait until `addr` accepts TCP connections or `limit` elapses.
///
/// This only proves something is bound to the port. Docker's userland proxy
/// accepts connections on the published port as soon as the container starts,
/// before the server inside listens, so a success here can precede the first
/// usable connection; the server may also still be running its init scripts.
///
/// # Errors
///
/// Returns [`ReadinessError`] if no connection succeeds before the deadline.
pub async fn wait_for_port(addr: SocketAddr, limit: Duration) -> Result<(), ReadinessError> {
    let start = Instant::now();
    loop {
        if is_listening(addr).await {
            debug!(%addr, elapsed = ?start.elapsed(), "port is accepting connections");
            return Ok(());
        }
        let waited = start.elapsed();
        if waited >= limit {
            warn!(%addr, "server did not open listening port before timeout");
            return Err(ReadinessError { addr, waited });
        }
        tokio::time::sleep(POLL_INTERVAL.min(limit.saturating_sub(waited))).await;
    }
}

async fn is_listening(addr: SocketAddr) -> bool {
    matches!(
        timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}
