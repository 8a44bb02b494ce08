//! Inbound TCP accept loop (§4.4).
//!
//! Binds one listening socket and hands each accepted stream off to
//! [`connection::accept`] for the acceptor side of the handshake. Successful
//! handshakes are reported on the returned channel; failed ones are logged
//! and dropped without affecting the listener.

use std::net::SocketAddr;
use std::time::Duration;

use kvm_core::protocol::messages::HandshakeMessage;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::connection::{accept, Connection, ConnectionEvent, PeerHandshakeInfo};

const HANDSHAKE_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind listen socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A peer that just completed the inbound handshake, together with its
/// connection handle and the receive channel the control core should drain.
pub struct AcceptedPeer {
    pub connection: Connection,
    pub info: PeerHandshakeInfo,
    pub events: mpsc::Receiver<ConnectionEvent>,
    pub peer_addr: SocketAddr,
}

/// Binds `listen_port` on all interfaces and spawns the accept loop. `local`
/// is cloned into every acceptor handshake since `HandshakeMessage` carries
/// no per-connection state.
pub async fn start_listener(
    listen_port: u16,
    local: HandshakeMessage,
) -> Result<mpsc::Receiver<AcceptedPeer>, ListenerError> {
    let addr: SocketAddr = format!("0.0.0.0:{listen_port}")
        .parse()
        .expect("valid listen address");
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::BindFailed { addr, source })?;

    let (tx, rx) = mpsc::channel(16);
    info!("listening for peer connections on {addr}");

    tokio::spawn(async move {
        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };

            let local = local.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                match accept(stream, local, HANDSHAKE_DEADLINE).await {
                    Ok((connection, info, events)) => {
                        info!("peer {} ({}) connected from {peer_addr}", info.machine_name, info.machine_id);
                        let _ = tx
                            .send(AcceptedPeer {
                                connection,
                                info,
                                events,
                                peer_addr,
                            })
                            .await;
                    }
                    Err(e) => warn!("handshake with {peer_addr} failed: {e}"),
                }
            });
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(id: &str) -> HandshakeMessage {
        HandshakeMessage {
            machine_id: id.repeat(32),
            machine_name: "test-host".into(),
            screen_width: 1920,
            screen_height: 1080,
            supports_clipboard: false,
        }
    }

    #[tokio::test]
    async fn start_listener_binds_successfully_on_an_ephemeral_port() {
        let rx = start_listener(0, handshake("a")).await;
        assert!(rx.is_ok());
    }

    #[tokio::test]
    async fn start_listener_accepts_connections_on_an_ephemeral_port() {
        use crate::infrastructure::network::connection::connect;

        // Bind with an OS-assigned port via the raw std listener to learn
        // which port the async start_listener below should target.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let mut rx = start_listener(port, handshake("b")).await.unwrap();
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

        let client = tokio::spawn(async move {
            connect(addr, handshake("a"), Duration::from_secs(2)).await
        });

        let accepted = rx.recv().await.expect("listener should accept one peer");
        assert_eq!(accepted.info.machine_id, "a".repeat(32));

        let (_, client_info, _rx) = client.await.unwrap().unwrap();
        assert_eq!(client_info.machine_id, "b".repeat(32));
    }
}
