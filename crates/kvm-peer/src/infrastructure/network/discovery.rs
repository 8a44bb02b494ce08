//! UDP broadcast-based peer discovery (§4.2).
//!
//! Every instance both broadcasts its own presence datagram and listens for
//! datagrams from other instances — the peer model is fully symmetric, so
//! there is no special "responder" role as there would be in a master/client
//! split. A single UDP socket is bound to the discovery port with
//! `SO_BROADCAST` enabled; a dedicated thread runs a send-every-5s /
//! receive-with-timeout loop so the Tokio runtime is never blocked by
//! synchronous socket I/O.
//!
//! Discovered records that have not been refreshed for 30 s are evicted on
//! every broadcast tick and reported as [`DiscoveryEvent::PeerLost`].

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kvm_core::domain::peer::MachineId;
use kvm_core::protocol::messages::DiscoveryDatagram;
use kvm_core::protocol::{decode_discovery, encode_discovery};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::infrastructure::net_interfaces::broadcast_addresses;

const BROADCAST_INTERVAL: Duration = Duration::from_secs(5);
const RECV_TIMEOUT: Duration = Duration::from_millis(500);
const STALENESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for discovery service operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to enable broadcast on discovery socket: {0}")]
    BroadcastUnavailable(std::io::Error),
}

/// A peer presence datagram paired with the address it arrived from.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPeer {
    pub id: MachineId,
    pub name: String,
    pub source_addr: SocketAddr,
    pub listen_port: u16,
    pub screen_width: i32,
    pub screen_height: i32,
}

/// Events surfaced to the application layer as peers come and go.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    PeerDiscovered(DiscoveredPeer),
    PeerLost(MachineId),
}

/// Static description of this host, broadcast on every tick.
#[derive(Debug, Clone)]
pub struct LocalPresence {
    pub machine_id: MachineId,
    pub machine_name: String,
    pub listen_port: u16,
    pub screen_width: i32,
    pub screen_height: i32,
}

/// Binds a UDP socket on `discovery_port` and spawns a background thread
/// that both broadcasts `local` every 5 seconds and listens for peer
/// datagrams, emitting [`DiscoveryEvent`]s on the returned channel.
///
/// # Errors
///
/// Returns [`DiscoveryError::BindFailed`] if the socket cannot be bound.
pub fn start_discovery(
    discovery_port: u16,
    local: LocalPresence,
    running: Arc<AtomicBool>,
) -> Result<mpsc::Receiver<DiscoveryEvent>, DiscoveryError> {
    let addr: SocketAddr = format!("0.0.0.0:{discovery_port}")
        .parse()
        .expect("valid discovery bind address");
    let socket =
        UdpSocket::bind(addr).map_err(|source| DiscoveryError::BindFailed { addr, source })?;
    socket
        .set_broadcast(true)
        .map_err(DiscoveryError::BroadcastUnavailable)?;
    socket.set_read_timeout(Some(RECV_TIMEOUT)).ok();

    let (tx, rx) = mpsc::channel(64);

    std::thread::Builder::new()
        .name("kvm-discovery".to_string())
        .spawn(move || discovery_loop(socket, discovery_port, local, tx, running))
        .expect("failed to spawn discovery thread");

    info!("discovery service listening on UDP {addr}");
    Ok(rx)
}

fn discovery_loop(
    socket: UdpSocket,
    discovery_port: u16,
    local: LocalPresence,
    tx: mpsc::Sender<DiscoveryEvent>,
    running: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; 2048];
    let mut last_seen: HashMap<MachineId, Instant> = HashMap::new();
    let mut last_broadcast = Instant::now() - BROADCAST_INTERVAL;

    while running.load(Ordering::Relaxed) {
        if last_broadcast.elapsed() >= BROADCAST_INTERVAL {
            broadcast_presence(&socket, discovery_port, &local);
            evict_stale(&mut last_seen, &tx);
            last_broadcast = Instant::now();
        }

        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                error!("discovery recv error: {e}");
                continue;
            }
        };

        let datagram_bytes = &buf[..len];
        match decode_discovery(datagram_bytes) {
            Ok(datagram) if datagram.machine_id == local.machine_id => {
                // Our own broadcast looped back; ignore.
            }
            Ok(datagram) => {
                let is_new = !last_seen.contains_key(&datagram.machine_id);
                last_seen.insert(datagram.machine_id.clone(), Instant::now());

                if is_new {
                    debug!(
                        "discovered peer {} ({}) at {src}",
                        datagram.machine_name, datagram.machine_id
                    );
                    let event = DiscoveryEvent::PeerDiscovered(to_discovered_peer(datagram, src));
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                debug!("ignoring malformed discovery datagram from {src}: {e}");
            }
        }
    }

    info!("discovery service stopped");
}

fn to_discovered_peer(d: DiscoveryDatagram, source_addr: SocketAddr) -> DiscoveredPeer {
    DiscoveredPeer {
        id: d.machine_id,
        name: d.machine_name,
        source_addr,
        listen_port: d.listen_port.clamp(0, u16::MAX as i32) as u16,
        screen_width: d.screen_width,
        screen_height: d.screen_height,
    }
}

fn broadcast_presence(socket: &UdpSocket, discovery_port: u16, local: &LocalPresence) {
    let datagram = DiscoveryDatagram {
        machine_id: local.machine_id.clone(),
        machine_name: local.machine_name.clone(),
        listen_port: local.listen_port as i32,
        screen_width: local.screen_width,
        screen_height: local.screen_height,
    };
    let bytes = encode_discovery(&datagram);

    for addr in broadcast_addresses() {
        let dest = SocketAddr::new(addr.into(), discovery_port);
        if let Err(e) = socket.send_to(&bytes, dest) {
            warn!("failed to broadcast presence to {dest}: {e}");
        }
    }
}

fn evict_stale(last_seen: &mut HashMap<MachineId, Instant>, tx: &mpsc::Sender<DiscoveryEvent>) {
    let stale: Vec<MachineId> = last_seen
        .iter()
        .filter(|(_, seen)| seen.elapsed() > STALENESS_TIMEOUT)
        .map(|(id, _)| id.clone())
        .collect();

    for id in stale {
        last_seen.remove(&id);
        info!("peer {id} timed out (no presence datagram for 30s)");
        let _ = tx.blocking_send(DiscoveryEvent::PeerLost(id));
    }
}

fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_timeout_error_recognises_would_block_and_timed_out() {
        assert!(is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "would block"
        )));
        assert!(is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out"
        )));
        assert!(!is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused"
        )));
    }

    #[test]
    fn evict_stale_reports_peers_past_the_staleness_timeout() {
        let mut last_seen = HashMap::new();
        last_seen.insert(
            "stale-peer".to_string(),
            Instant::now() - Duration::from_secs(31),
        );
        last_seen.insert("fresh-peer".to_string(), Instant::now());

        let (tx, mut rx) = mpsc::channel(8);
        evict_stale(&mut last_seen, &tx);
        drop(tx);

        let event = rx.blocking_recv().expect("one eviction event expected");
        assert_eq!(event, DiscoveryEvent::PeerLost("stale-peer".to_string()));
        assert!(last_seen.contains_key("fresh-peer"));
        assert!(!last_seen.contains_key("stale-peer"));
    }

    #[test]
    fn start_discovery_binds_successfully_on_an_ephemeral_port() {
        let probe = UdpSocket::bind("0.0.0.0:0").expect("probe bind");
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let local = LocalPresence {
            machine_id: "f".repeat(32),
            machine_name: "test-host".into(),
            listen_port: 24800,
            screen_width: 1920,
            screen_height: 1080,
        };
        let running = Arc::new(AtomicBool::new(false));
        let result = start_discovery(port, local, running);
        assert!(result.is_ok());
    }
}
