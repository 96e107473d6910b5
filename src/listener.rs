use log::{debug, info, warn};
use tokio::net::TcpListener;

use std::net::SocketAddr;

#[derive(Debug)]
pub enum BindError {
    InvalidAddress(String),
    NoAvailablePort { start: u16, end: u16 },
}

impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BindError::InvalidAddress(s) => {
                write!(f, "Not a valid listen address: {s}")
            },
            BindError::NoAvailablePort { start, end } => {
                write!(f, "No available ports found in range {start}-{end}")
            },
        }
    }
}

impl std::error::Error for BindError {}

/**
 * Produces a bound, listening socket.
 *
 * An explicit listen address is tried first. If it cannot be bound (port
 * already in use), or if no explicit address was given, the inclusive port
 * range is searched in ascending order on the wildcard interface and the
 * first bindable port wins. A single pass over the range is definitive.
 */
pub async fn acquire_listener(
    listen_addr: Option<&str>,
    start_port: u16,
    end_port: u16,
) -> Result<TcpListener, BindError> {
    if let Some(addr) = listen_addr {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| BindError::InvalidAddress(addr.to_owned()))?;
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("listening on requested address {addr}");
                return Ok(listener);
            }
            Err(e) => {
                warn!("Could not bind {addr}: {e}, searching range {start_port}-{end_port} for an available port");
            }
        }
    }

    for port in start_port..=end_port {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                info!("found available port: {port}");
                return Ok(listener);
            }
            Err(e) => {
                debug!("port {port} not available: {e}");
            }
        }
    }

    Err(BindError::NoAvailablePort {
        start: start_port,
        end: end_port,
    })
}
