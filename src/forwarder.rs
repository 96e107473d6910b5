use log::*;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use std::error::Error;
use std::future::Future;
use std::net::SocketAddr;

use crate::common::{ConfigError, ForwarderConfig, PROBE_TIMEOUT};
use crate::interfaces;
use crate::listener;
use crate::relay;

#[derive(Debug, Clone)]
struct RunBeforeBindError;

impl std::fmt::Display for RunBeforeBindError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "bind() has to be called before run()")
    }
}
impl Error for RunBeforeBindError {}

#[derive(Debug)]
pub enum ProbeError {
    Timeout { dest_addr: String, seconds: u64 },
    Unreachable { dest_addr: String, source: std::io::Error },
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ProbeError::Timeout { dest_addr, seconds } => {
                write!(f, "Destination {dest_addr} did not answer within {seconds}s")
            },
            ProbeError::Unreachable { dest_addr, source } => {
                write!(f, "Cannot connect to destination {dest_addr}: {source}")
            },
        }
    }
}

impl Error for ProbeError {}

///
/// Owns the accept loop of the forwarder and sequences its startup:
/// destination probe, listener acquisition, status banner, then one relay
/// pair per accepted connection until the process ends or a shutdown signal
/// closes the loop.
///
pub struct Forwarder {
    pub listener: Option<TcpListener>,
    dest_addr: String,
    listen_addr: Option<String>,
    port_range_start: u16,
    port_range_end: u16,
    enable_graceful_shutdown: bool,
}

impl Forwarder {
    pub fn new(config: &ForwarderConfig) -> Result<Forwarder, ConfigError> {
        config.validate()?;
        Ok(Forwarder {
            listener: None,
            dest_addr: config
                .dest_addr
                .clone()
                .expect("validated config has a destination"),
            listen_addr: config.listen_addr.clone(),
            port_range_start: config
                .port_range_start
                .unwrap_or(crate::common::DEFAULT_PORT_RANGE_START),
            port_range_end: config
                .port_range_end
                .unwrap_or(crate::common::DEFAULT_PORT_RANGE_END),
            enable_graceful_shutdown: config.enable_graceful_shutdown.unwrap_or(true),
        })
    }

    /**
     * returns None if the forwarder is not bound to a socket yet
     */
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listener
            .as_ref()
            .map(|listener| listener.local_addr().unwrap())
    }

    /**
     * Short, bounded connectivity check against the destination, run before
     * any traffic is served. This is a one-shot sanity check: a destination
     * that becomes unreachable later only surfaces as per-connection dial
     * errors.
     */
    pub async fn probe_destination(&self) -> Result<(), ProbeError> {
        info!("testing connection to destination {}...", self.dest_addr);
        match timeout(PROBE_TIMEOUT, TcpStream::connect(self.dest_addr.as_str())).await {
            Ok(Ok(_)) => {
                debug!("destination {} is reachable", self.dest_addr);
                Ok(())
            }
            Ok(Err(e)) => Err(ProbeError::Unreachable {
                dest_addr: self.dest_addr.clone(),
                source: e,
            }),
            Err(_) => Err(ProbeError::Timeout {
                dest_addr: self.dest_addr.clone(),
                seconds: PROBE_TIMEOUT.as_secs(),
            }),
        }
    }

    /**
     * Acquire the listening socket, either on the configured listen address
     * or on the first available port of the configured range.
     */
    pub async fn bind(&mut self) -> Result<(), Box<dyn Error>> {
        let listener = listener::acquire_listener(
            self.listen_addr.as_deref(),
            self.port_range_start,
            self.port_range_end,
        )
        .await?;
        debug!("listening on {}", listener.local_addr()?);
        self.listener = Some(listener);
        Ok(())
    }

    /**
     * Run the accept loop until the process is killed, or until Ctrl-C when
     * graceful shutdown is enabled.
     */
    pub async fn run(&mut self) -> Result<(), Box<dyn Error>> {
        if self.enable_graceful_shutdown {
            self.run_until(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received");
            })
            .await
        } else {
            self.run_until(std::future::pending::<()>()).await
        }
    }

    /**
     * Run the accept loop until the given shutdown future resolves.
     *
     * Every accepted connection is handed to an independent relay task; the
     * loop itself never waits on relay progress. Accept errors are logged and
     * the loop continues. When the shutdown future resolves the loop exits
     * before the listener is dropped, so a deliberate close never shows up as
     * an accept error. In-flight relay pairs are not cancelled; they run
     * until their own connections close.
     */
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), Box<dyn Error>>
    where
        F: Future<Output = ()>,
    {
        if self.listener.is_none() {
            return Err(Box::new(RunBeforeBindError));
        }
        let listener = self.listener.as_ref().unwrap();

        println!("\nPort forwarder started");
        println!("Forwarding to {}", self.dest_addr);
        println!("Listening on port {}", listener.local_addr()?.port());
        println!("\nAvailable network interfaces:");
        interfaces::print_reachable_interfaces();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        info!("New connection from: {remote_addr}");
                        tokio::spawn(relay::handle_connection(stream, self.dest_addr.clone()));
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {e}");
                    }
                },
                _ = &mut shutdown => {
                    info!("shutting down, closing listener");
                    break;
                }
            }
        }

        self.listener = None;
        info!("listener closed");
        Ok(())
    }
}
