// Base notes:
//  * A relay pair couples one inbound and one outbound connection
//  * Bytes are pumped in both directions until either side closes or errors
//  * The two directions never outlive each other: whichever finishes first
//    tears the whole pair down
//  * Pairs are fully independent, a stuck or failing pair never affects others

use log::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use std::net::SocketAddr;

/**
 * Handles one accepted connection for its entire lifetime.
 *
 * Dials the destination exactly once; a dial failure closes the inbound
 * connection and abandons the attempt. On success both copy directions run
 * concurrently until one of them sees EOF or an error, at which point the
 * other direction is cancelled and both sockets are closed. No descriptor
 * survives this function, whichever way the copying ends.
 */
pub async fn handle_connection(mut inbound: TcpStream, dest_addr: String) {
    let peer_addr = match inbound.peer_addr() {
        Ok(v) => v,
        Err(e) => {
            warn!("Could not read peer address of inbound connection: {e}");
            return;
        }
    };

    let outbound = match TcpStream::connect(dest_addr.as_str()).await {
        Ok(v) => v,
        Err(e) => {
            error!("Could not connect to destination {dest_addr} for {peer_addr}: {e}");
            let _ = inbound.shutdown().await;
            return;
        }
    };
    debug!("opened relay pair {peer_addr} <-> {dest_addr}");

    let (inbound_read, inbound_write) = inbound.into_split();
    let (outbound_read, outbound_write) = outbound.into_split();

    let mut upstream = tokio::spawn(copy_bytes(
        inbound_read,
        outbound_write,
        peer_addr,
        "client->destination",
    ));
    let mut downstream = tokio::spawn(copy_bytes(
        outbound_read,
        inbound_write,
        peer_addr,
        "destination->client",
    ));

    // Whichever direction finishes first cancels the other instead of waiting
    // for the close to propagate through the transport. Aborting drops the
    // task's stream halves, so both sockets are closed before this returns.
    tokio::select! {
        _ = &mut upstream => {
            downstream.abort();
            let _ = downstream.await;
        }
        _ = &mut downstream => {
            upstream.abort();
            let _ = upstream.await;
        }
    }

    debug!("relay pair {peer_addr} <-> {dest_addr} closed");
}

/**
 * Copies raw bytes from `source` to `sink` until EOF or an error. Sends a
 * write shutdown to the sink afterwards so the far side sees EOF promptly.
 */
async fn copy_bytes(
    mut source: OwnedReadHalf,
    mut sink: OwnedWriteHalf,
    peer_addr: SocketAddr,
    direction: &'static str,
) {
    let mut buf = [0; 65535];
    loop {
        let read = match source.read(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                error!("Error reading {direction} for {peer_addr}: {e}");
                break;
            }
        };
        if read == 0 {
            debug!("EOF {direction} for {peer_addr}");
            break;
        }
        if let Err(e) = sink.write_all(&buf[..read]).await {
            error!("Error writing {direction} for {peer_addr}: {e}");
            break;
        }
        trace!("relayed {read} bytes {direction} for {peer_addr}");
    }
    let _ = sink.shutdown().await;
}
