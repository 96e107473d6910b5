use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use std::error::Error;
use std::net::SocketAddr;

use portbridge::common::ForwarderConfig;
use portbridge::forwarder::Forwarder;

/**
 * A forwarder running in a background task, relaying to a destination
 * listener owned by the test.
 */
pub struct RunningForwarder {
    pub listen_addr: SocketAddr,
    pub destination: TcpListener,
    pub shutdown: oneshot::Sender<()>,
    pub run_task: JoinHandle<Result<(), String>>,
}

impl RunningForwarder {
    /**
     * Connects a client through the forwarder and accepts the paired
     * connection on the destination side.
     */
    pub async fn connect_pair(&self) -> Result<(TcpStream, TcpStream), Box<dyn Error>> {
        let client_stream = TcpStream::connect(self.listen_addr).await?;
        let (server_stream, _) = self.destination.accept().await?;
        Ok((client_stream, server_stream))
    }

    /**
     * Signals shutdown and waits for the accept loop to finish.
     */
    pub async fn shutdown(self) -> Result<(), String> {
        let _ = self.shutdown.send(());
        match self.run_task.await {
            Ok(v) => v,
            Err(e) => Err(format!("run task panicked: {e}")),
        }
    }
}

/**
 * Starts a destination listener on an ephemeral port and a forwarder bound to
 * another ephemeral port relaying to it, with the accept loop running in a
 * background task.
 */
pub async fn setup_forwarder() -> Result<RunningForwarder, Box<dyn Error>> {
    let destination = TcpListener::bind("127.0.0.1:0").await?;
    let dest_addr = destination.local_addr()?.to_string();

    let mut config = ForwarderConfig {
        listen_addr: Some("127.0.0.1:0".to_string()),
        dest_addr: Some(dest_addr),
        ..Default::default()
    };
    config.fill_defaults();

    let mut forwarder = Forwarder::new(&config)?;
    forwarder.probe_destination().await?;
    // the probe leaves one connection in the destination backlog, drain it
    let _ = destination.accept().await?;

    forwarder.bind().await?;
    let listen_addr = forwarder
        .listen_addr()
        .expect("forwarder is bound after bind()");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let run_task = tokio::spawn(async move {
        forwarder
            .run_until(async {
                let _ = shutdown_rx.await;
            })
            .await
            .map_err(|e| e.to_string())
    });

    Ok(RunningForwarder {
        listen_addr,
        destination,
        shutdown: shutdown_tx,
        run_task,
    })
}

/**
 * Sends `len` random bytes into `from` and expects to read exactly the same
 * bytes out of `to`. Returns both streams for further use.
 */
pub async fn assert_stream_connected(
    mut from: TcpStream,
    mut to: TcpStream,
    len: usize,
) -> (TcpStream, TcpStream) {
    let mut payload = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut payload);

    let expected = payload.clone();
    let write_task = tokio::spawn(async move {
        from.write_all(&payload)
            .await
            .expect("write to stream failed");
        from
    });

    let mut received = vec![0u8; len];
    to.read_exact(&mut received)
        .await
        .expect("read from stream failed");
    let from = write_task.await.expect("write task failed");

    assert_eq!(expected, received, "relayed bytes differ from sent bytes");
    (from, to)
}
