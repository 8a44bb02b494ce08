//! One reliable, ordered TCP byte stream to one peer (§4.3).
//!
//! `TCP_NODELAY` is enabled so small input events are not coalesced by
//! Nagle's algorithm. A background receive task owns the read half and
//! dispatches frames as [`ConnectionEvent`]s; `Ping` is answered with `Pong`
//! inside this module and never surfaced to the control core. The write
//! half is guarded by a mutex so concurrent senders cannot interleave a
//! single frame's bytes.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use kvm_core::domain::peer::MachineId;
use kvm_core::protocol::messages::{HandshakeAckMessage, HandshakeMessage};
use kvm_core::protocol::{decode_message, encode_message_now, peek_frame_len, KvmMessage};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, warn};

use kvm_core::protocol::messages::HEADER_SIZE;

/// The receive-loop liveness deadline (§4.3): if no frame arrives within
/// this window the connection is considered dead.
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("peer rejected handshake: {0}")]
    HandshakePeerRejected(String),
    #[error("peer sent an unexpected message during handshake")]
    HandshakeProtocolError,
    #[error("handshake did not complete within the deadline")]
    HandshakeTimeout,
    #[error("connection closed by peer")]
    ConnectionClosedByPeer,
    #[error("no frame received for {0:?}; connection considered dead")]
    LivenessTimeout(Duration),
    #[error("transport error: {0}")]
    TransportError(#[from] io::Error),
}

/// Events surfaced from the receive loop to the control core. `Ping`/`Pong`
/// are handled entirely inside this module and never appear here.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Message(KvmMessage),
    Disconnected,
}

/// The outcome of a successful handshake: identity and screen size the
/// other side reported.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerHandshakeInfo {
    pub machine_id: MachineId,
    pub machine_name: String,
    pub screen_width: i32,
    pub screen_height: i32,
}

/// A live connection to one peer. Cheap to clone — the write half is
/// shared behind an `Arc<Mutex<_>>`.
#[derive(Clone)]
pub struct Connection {
    peer_id: MachineId,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    recv_task: tokio::task::AbortHandle,
}

impl Connection {
    /// Sends `msg` as a complete framed write, flushing before returning.
    pub async fn send(&self, msg: &KvmMessage) -> Result<(), ConnectionError> {
        let bytes = encode_message_now(msg).map_err(|e| {
            ConnectionError::TransportError(io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    pub fn peer_id(&self) -> &MachineId {
        &self.peer_id
    }

    /// Stops this connection's receive loop. Used when a duplicate
    /// handshake for the same peer id replaces this connection, so the old
    /// socket's receive task does not keep running against a stale stream.
    pub fn abort_receive_loop(&self) {
        self.recv_task.abort();
    }
}

/// Dials `addr`, performs the initiator side of the handshake, and spawns
/// the receive loop. `deadline` bounds the handshake only.
pub async fn connect(
    addr: SocketAddr,
    local: HandshakeMessage,
    deadline: Duration,
) -> Result<(Connection, PeerHandshakeInfo, mpsc::Receiver<ConnectionEvent>), ConnectionError> {
    let stream = timeout(deadline, TcpStream::connect(addr))
        .await
        .map_err(|_| ConnectionError::HandshakeTimeout)??;
    stream.set_nodelay(true).ok();
    let (mut read_half, write_half) = stream.into_split();

    let bytes = encode_message_now(&KvmMessage::Handshake(local))
        .map_err(|e| ConnectionError::TransportError(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    {
        let mut write_half = write_half;
        timeout(deadline, async {
            write_half.write_all(&bytes).await?;
            write_half.flush().await
        })
        .await
        .map_err(|_| ConnectionError::HandshakeTimeout)??;

        let reply = timeout(deadline, read_one_message(&mut read_half))
            .await
            .map_err(|_| ConnectionError::HandshakeTimeout)??;

        let info = match reply {
            KvmMessage::HandshakeAck(HandshakeAckMessage {
                accepted: true,
                machine_id,
                machine_name,
                screen_width,
                screen_height,
                ..
            }) => PeerHandshakeInfo {
                machine_id,
                machine_name,
                screen_width,
                screen_height,
            },
            KvmMessage::HandshakeAck(HandshakeAckMessage {
                accepted: false,
                reject_reason,
                ..
            }) => return Err(ConnectionError::HandshakePeerRejected(reject_reason)),
            _ => return Err(ConnectionError::HandshakeProtocolError),
        };

        let writer = Arc::new(Mutex::new(write_half));
        let (tx, rx) = mpsc::channel(256);
        let recv_task = spawn_receive_loop(read_half, Arc::clone(&writer), tx);
        let connection = Connection {
            peer_id: info.machine_id.clone(),
            writer,
            recv_task,
        };
        Ok((connection, info, rx))
    }
}

/// Accepts the acceptor side of the handshake on an already-connected
/// `stream`, replying with `HandshakeAck`, then spawns the receive loop.
pub async fn accept(
    stream: TcpStream,
    local: HandshakeMessage,
    deadline: Duration,
) -> Result<(Connection, PeerHandshakeInfo, mpsc::Receiver<ConnectionEvent>), ConnectionError> {
    stream.set_nodelay(true).ok();
    let (mut read_half, write_half) = stream.into_split();

    let first = timeout(deadline, read_one_message(&mut read_half))
        .await
        .map_err(|_| ConnectionError::HandshakeTimeout)??;

    let peer_handshake = match first {
        KvmMessage::Handshake(h) => h,
        _ => return Err(ConnectionError::HandshakeProtocolError),
    };

    let info = PeerHandshakeInfo {
        machine_id: peer_handshake.machine_id.clone(),
        machine_name: peer_handshake.machine_name.clone(),
        screen_width: peer_handshake.screen_width,
        screen_height: peer_handshake.screen_height,
    };

    let ack = KvmMessage::HandshakeAck(HandshakeAckMessage {
        accepted: true,
        machine_id: local.machine_id,
        machine_name: local.machine_name,
        screen_width: local.screen_width,
        screen_height: local.screen_height,
        reject_reason: String::new(),
    });
    let bytes = encode_message_now(&ack)
        .map_err(|e| ConnectionError::TransportError(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let mut write_half = write_half;
    timeout(deadline, async {
        write_half.write_all(&bytes).await?;
        write_half.flush().await
    })
    .await
    .map_err(|_| ConnectionError::HandshakeTimeout)??;

    let writer = Arc::new(Mutex::new(write_half));
    let (tx, rx) = mpsc::channel(256);
    let recv_task = spawn_receive_loop(read_half, Arc::clone(&writer), tx);
    let connection = Connection {
        peer_id: info.machine_id.clone(),
        writer,
        recv_task,
    };
    Ok((connection, info, rx))
}

/// Reads exactly one frame from `read_half`, used only during the
/// handshake where no receive loop is running yet.
async fn read_one_message(read_half: &mut OwnedReadHalf) -> Result<KvmMessage, ConnectionError> {
    let mut header = [0u8; HEADER_SIZE];
    read_half.read_exact(&mut header).await?;
    let total_len = peek_frame_len(&header)
        .map_err(|_| ConnectionError::HandshakeProtocolError)?;
    let mut buf = vec![0u8; total_len];
    buf[..HEADER_SIZE].copy_from_slice(&header);
    read_half.read_exact(&mut buf[HEADER_SIZE..]).await?;
    let (msg, _) = decode_message(&buf).map_err(|_| ConnectionError::HandshakeProtocolError)?;
    Ok(msg)
}

/// Spawns the steady-state receive loop: reads frames, answers `Ping` with
/// `Pong` inline, consumes `Pong` silently, and forwards everything else to
/// `tx`. Exits (and emits [`ConnectionEvent::Disconnected`]) on `Disconnect`,
/// a read error, or 30 s of silence. Returns an [`tokio::task::AbortHandle`]
/// so a duplicate handshake for the same peer id can cancel the task backing
/// the connection it replaces.
fn spawn_receive_loop(
    mut read_half: OwnedReadHalf,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    tx: mpsc::Sender<ConnectionEvent>,
) -> tokio::task::AbortHandle {
    let handle = tokio::spawn(async move {
        loop {
            let frame = match timeout(READ_IDLE_TIMEOUT, read_one_message(&mut read_half)).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::TransportError(io_err)))
                    if io_err.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    debug!("{}", ConnectionError::ConnectionClosedByPeer);
                    let _ = tx.send(ConnectionEvent::Disconnected).await;
                    break;
                }
                Ok(Err(e)) => {
                    warn!("receive loop error: {e}");
                    let _ = tx.send(ConnectionEvent::Disconnected).await;
                    break;
                }
                Err(_) => {
                    warn!("no frame received for {READ_IDLE_TIMEOUT:?}; closing connection");
                    let _ = tx.send(ConnectionEvent::Disconnected).await;
                    break;
                }
            };

            match frame {
                KvmMessage::Ping => {
                    let bytes = match encode_message_now(&KvmMessage::Pong) {
                        Ok(b) => b,
                        Err(_) => continue,
                    };
                    let mut w = writer.lock().await;
                    if w.write_all(&bytes).await.is_err() || w.flush().await.is_err() {
                        let _ = tx.send(ConnectionEvent::Disconnected).await;
                        break;
                    }
                }
                KvmMessage::Pong => {
                    debug!("pong received");
                }
                KvmMessage::Disconnect => {
                    let _ = tx.send(ConnectionEvent::Disconnected).await;
                    break;
                }
                other => {
                    if tx.send(ConnectionEvent::Message(other)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    handle.abort_handle()
}
