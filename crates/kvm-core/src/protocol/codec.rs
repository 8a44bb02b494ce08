//! Binary codec for encoding and decoding KVM-Over-IP protocol messages.
//!
//! Wire format:
//! ```text
//! [magic:2]["MS"][version:1][type:1][payload_len:4][timestamp_millis:8][payload:N]
//! ```
//! Total header size: 16 bytes. All multi-byte integers are little-endian.
//! Strings are a 4-byte little-endian length prefix followed by UTF-8 bytes.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::protocol::messages::{
    ClipboardContentType, ClipboardMessage, CursorEnterMessage, CursorLeaveMessage,
    DiscoveryDatagram, ErrorMessage, HandshakeAckMessage, HandshakeMessage, KeyEventType,
    KeyboardMessage, KvmMessage, MessageType, MouseEventType, MouseMessage, WireEdge,
    DISCOVERY_MAGIC, HEADER_SIZE, MAGIC, MAX_PAYLOAD_LEN, PROTOCOL_VERSION,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The first two header bytes are not `"MS"`.
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// The protocol version byte in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownType(u8),

    /// Fewer bytes are available than the header declares, or a field inside
    /// the payload runs past the end of the buffer.
    #[error("truncated payload: {context}")]
    TruncatedPayload { context: String },

    /// The declared payload length exceeds [`MAX_PAYLOAD_LEN`].
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`KvmMessage`] into a byte vector including the 16-byte header.
///
/// # Examples
///
/// ```rust
/// use kvm_core::protocol::{encode_message, decode_message};
/// use kvm_core::protocol::messages::KvmMessage;
///
/// let msg = KvmMessage::Ping;
/// let bytes = encode_message(&msg, 0).unwrap();
/// let (decoded, n) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(n, bytes.len());
/// ```
pub fn encode_message(msg: &KvmMessage, timestamp_millis: i64) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg);
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload.len()));
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    buf.extend_from_slice(&timestamp_millis.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Encodes a [`KvmMessage`] stamping the current wall-clock time.
pub fn encode_message_now(msg: &KvmMessage) -> Result<Vec<u8>, ProtocolError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;
    encode_message(msg, millis)
}

/// Returns the total frame length (header + payload) declared by the first
/// 8 bytes of a frame, without validating or decoding the rest.
pub fn peek_frame_len(header_prefix: &[u8]) -> Result<usize, ProtocolError> {
    if header_prefix.len() < 8 {
        return Err(ProtocolError::TruncatedPayload {
            context: "need at least 8 bytes to read payload length".into(),
        });
    }
    if header_prefix[0..2] != MAGIC {
        return Err(ProtocolError::InvalidMagic);
    }
    let payload_len = i32::from_le_bytes([
        header_prefix[4],
        header_prefix[5],
        header_prefix[6],
        header_prefix[7],
    ]);
    if payload_len < 0 || payload_len as usize > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload_len.max(0) as usize));
    }
    Ok(HEADER_SIZE + payload_len as usize)
}

/// Decodes one [`KvmMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload), so the caller can advance their read cursor.
///
/// # Examples
///
/// ```rust
/// use kvm_core::protocol::{encode_message, decode_message};
/// use kvm_core::protocol::messages::KvmMessage;
///
/// let original = KvmMessage::Pong;
/// let bytes = encode_message(&original, 0).unwrap();
/// let (decoded, n) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, original);
/// assert_eq!(n, bytes.len());
/// ```
pub fn decode_message(bytes: &[u8]) -> Result<(KvmMessage, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::TruncatedPayload {
            context: format!("need {HEADER_SIZE} header bytes, got {}", bytes.len()),
        });
    }
    if bytes[0..2] != MAGIC {
        return Err(ProtocolError::InvalidMagic);
    }
    let version = bytes[2];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }
    let type_byte = bytes[3];
    let msg_type = MessageType::try_from(type_byte).map_err(ProtocolError::UnknownType)?;

    let payload_len = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if payload_len < 0 || payload_len as usize > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge(payload_len.max(0) as usize));
    }
    let payload_len = payload_len as usize;

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::TruncatedPayload {
            context: format!("need {total_needed} total bytes, got {}", bytes.len()),
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let msg = decode_payload(msg_type, payload)?;
    Ok((msg, total_needed))
}

/// Encodes a discovery broadcast datagram per the `"MSDISC"` format.
pub fn encode_discovery(d: &DiscoveryDatagram) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&DISCOVERY_MAGIC);
    buf.push(PROTOCOL_VERSION);
    write_string(&mut buf, &d.machine_id);
    write_string(&mut buf, &d.machine_name);
    buf.extend_from_slice(&d.listen_port.to_le_bytes());
    buf.extend_from_slice(&d.screen_width.to_le_bytes());
    buf.extend_from_slice(&d.screen_height.to_le_bytes());
    buf
}

/// Decodes a discovery broadcast datagram. Any datagram not starting with
/// `"MSDISC"` is rejected with [`ProtocolError::InvalidMagic`] so that
/// foreign broadcast traffic on the same port is silently ignored by
/// callers that treat this as a filter rather than a hard error.
pub fn decode_discovery(bytes: &[u8]) -> Result<DiscoveryDatagram, ProtocolError> {
    require_len(bytes, 7, "discovery header")?;
    if bytes[0..6] != DISCOVERY_MAGIC {
        return Err(ProtocolError::InvalidMagic);
    }
    let version = bytes[6];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }
    let mut offset = 7;
    let (machine_id, next) = read_string(bytes, offset)?;
    offset = next;
    let (machine_name, next) = read_string(bytes, offset)?;
    offset = next;
    let listen_port = read_i32(bytes, offset)?;
    offset += 4;
    let screen_width = read_i32(bytes, offset)?;
    offset += 4;
    let screen_height = read_i32(bytes, offset)?;

    Ok(DiscoveryDatagram {
        machine_id,
        machine_name,
        listen_port,
        screen_width,
        screen_height,
    })
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &KvmMessage) -> Vec<u8> {
    let mut buf = Vec::new();
    match msg {
        KvmMessage::Handshake(m) => encode_handshake(&mut buf, m),
        KvmMessage::HandshakeAck(m) => encode_handshake_ack(&mut buf, m),
        KvmMessage::Mouse(m) => encode_mouse(&mut buf, m),
        KvmMessage::Keyboard(m) => encode_keyboard(&mut buf, m),
        KvmMessage::CursorEnter(m) => encode_cursor_enter(&mut buf, m),
        KvmMessage::CursorLeave(m) => encode_cursor_leave(&mut buf, m),
        KvmMessage::Clipboard(m) => encode_clipboard(&mut buf, m),
        KvmMessage::ClipboardRequest | KvmMessage::Ping | KvmMessage::Pong | KvmMessage::Disconnect => {}
        KvmMessage::Error(m) => encode_error(&mut buf, m),
    }
    buf
}

fn decode_payload(msg_type: MessageType, payload: &[u8]) -> Result<KvmMessage, ProtocolError> {
    match msg_type {
        MessageType::Handshake => decode_handshake(payload).map(KvmMessage::Handshake),
        MessageType::HandshakeAck => decode_handshake_ack(payload).map(KvmMessage::HandshakeAck),
        MessageType::Mouse => decode_mouse(payload).map(KvmMessage::Mouse),
        MessageType::Keyboard => decode_keyboard(payload).map(KvmMessage::Keyboard),
        MessageType::CursorEnter => decode_cursor_enter(payload).map(KvmMessage::CursorEnter),
        MessageType::CursorLeave => decode_cursor_leave(payload).map(KvmMessage::CursorLeave),
        MessageType::Clipboard => decode_clipboard(payload).map(KvmMessage::Clipboard),
        MessageType::ClipboardRequest => Ok(KvmMessage::ClipboardRequest),
        MessageType::Ping => Ok(KvmMessage::Ping),
        MessageType::Pong => Ok(KvmMessage::Pong),
        MessageType::Disconnect => Ok(KvmMessage::Disconnect),
        MessageType::Error => decode_error(payload).map(KvmMessage::Error),
    }
}

// ── Per-message encode helpers ────────────────────────────────────────────────

fn encode_handshake(buf: &mut Vec<u8>, m: &HandshakeMessage) {
    write_string(buf, &m.machine_id);
    write_string(buf, &m.machine_name);
    buf.extend_from_slice(&m.screen_width.to_le_bytes());
    buf.extend_from_slice(&m.screen_height.to_le_bytes());
    buf.push(m.supports_clipboard as u8);
}

fn encode_handshake_ack(buf: &mut Vec<u8>, m: &HandshakeAckMessage) {
    buf.push(m.accepted as u8);
    write_string(buf, &m.machine_id);
    write_string(buf, &m.machine_name);
    buf.extend_from_slice(&m.screen_width.to_le_bytes());
    buf.extend_from_slice(&m.screen_height.to_le_bytes());
    write_string(buf, &m.reject_reason);
}

fn encode_mouse(buf: &mut Vec<u8>, m: &MouseMessage) {
    buf.extend_from_slice(&m.x.to_le_bytes());
    buf.extend_from_slice(&m.y.to_le_bytes());
    buf.push(m.event_type as u8);
    buf.extend_from_slice(&m.wheel_delta.to_le_bytes());
    if let Some((vx, vy)) = m.velocity {
        buf.extend_from_slice(&vx.to_le_bytes());
        buf.extend_from_slice(&vy.to_le_bytes());
    }
}

fn encode_keyboard(buf: &mut Vec<u8>, m: &KeyboardMessage) {
    buf.extend_from_slice(&m.key_code.to_le_bytes());
    buf.extend_from_slice(&m.scan_code.to_le_bytes());
    buf.push(m.event_type as u8);
    buf.push(m.is_extended as u8);
}

fn encode_cursor_enter(buf: &mut Vec<u8>, m: &CursorEnterMessage) {
    buf.extend_from_slice(&m.x.to_le_bytes());
    buf.extend_from_slice(&m.y.to_le_bytes());
    buf.push(m.edge as u8);
}

fn encode_cursor_leave(buf: &mut Vec<u8>, m: &CursorLeaveMessage) {
    buf.extend_from_slice(&m.x.to_le_bytes());
    buf.extend_from_slice(&m.y.to_le_bytes());
    buf.push(m.edge as u8);
}

fn encode_clipboard(buf: &mut Vec<u8>, m: &ClipboardMessage) {
    buf.push(m.content_type as u8);
    write_string(buf, &m.format_hint);
    buf.extend_from_slice(&(m.data.len() as u32).to_le_bytes());
    buf.extend_from_slice(&m.data);
}

fn encode_error(buf: &mut Vec<u8>, m: &ErrorMessage) {
    buf.extend_from_slice(&m.code.to_le_bytes());
    write_string(buf, &m.description);
}

// ── Per-message decode helpers ────────────────────────────────────────────────

fn decode_handshake(buf: &[u8]) -> Result<HandshakeMessage, ProtocolError> {
    let (machine_id, offset) = read_string(buf, 0)?;
    let (machine_name, offset) = read_string(buf, offset)?;
    let screen_width = read_i32(buf, offset)?;
    let screen_height = read_i32(buf, offset + 4)?;
    let supports_clipboard = read_u8(buf, offset + 8)? != 0;
    Ok(HandshakeMessage {
        machine_id,
        machine_name,
        screen_width,
        screen_height,
        supports_clipboard,
    })
}

fn decode_handshake_ack(buf: &[u8]) -> Result<HandshakeAckMessage, ProtocolError> {
    let accepted = read_u8(buf, 0)? != 0;
    let (machine_id, offset) = read_string(buf, 1)?;
    let (machine_name, offset) = read_string(buf, offset)?;
    let screen_width = read_i32(buf, offset)?;
    let screen_height = read_i32(buf, offset + 4)?;
    let (reject_reason, _) = read_string(buf, offset + 8)?;
    Ok(HandshakeAckMessage {
        accepted,
        machine_id,
        machine_name,
        screen_width,
        screen_height,
        reject_reason,
    })
}

fn decode_mouse(buf: &[u8]) -> Result<MouseMessage, ProtocolError> {
    require_len(buf, 13, "Mouse")?;
    let x = read_i32(buf, 0)?;
    let y = read_i32(buf, 4)?;
    let event_type_byte = buf[8];
    let event_type = MouseEventType::try_from(event_type_byte).map_err(|b| {
        ProtocolError::TruncatedPayload {
            context: format!("unknown mouse event type: {b}"),
        }
    })?;
    let wheel_delta = read_i32(buf, 9)?;
    let velocity = if buf.len() >= 21 {
        let vx = read_f32(buf, 13)?;
        let vy = read_f32(buf, 17)?;
        Some((vx, vy))
    } else {
        None
    };
    Ok(MouseMessage {
        x,
        y,
        event_type,
        wheel_delta,
        velocity,
    })
}

fn decode_keyboard(buf: &[u8]) -> Result<KeyboardMessage, ProtocolError> {
    require_len(buf, 10, "Keyboard")?;
    let key_code = read_i32(buf, 0)?;
    let scan_code = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    let event_type = KeyEventType::try_from(buf[8]).map_err(|b| ProtocolError::TruncatedPayload {
        context: format!("unknown keyboard event type: {b}"),
    })?;
    let is_extended = buf[9] != 0;
    Ok(KeyboardMessage {
        key_code,
        scan_code,
        event_type,
        is_extended,
    })
}

fn decode_cursor_enter(buf: &[u8]) -> Result<CursorEnterMessage, ProtocolError> {
    require_len(buf, 9, "CursorEnter")?;
    let x = read_f32(buf, 0)?;
    let y = read_f32(buf, 4)?;
    let edge = WireEdge::try_from(buf[8]).map_err(|b| ProtocolError::TruncatedPayload {
        context: format!("unknown edge value: {b}"),
    })?;
    Ok(CursorEnterMessage { x, y, edge })
}

fn decode_cursor_leave(buf: &[u8]) -> Result<CursorLeaveMessage, ProtocolError> {
    require_len(buf, 9, "CursorLeave")?;
    let x = read_f32(buf, 0)?;
    let y = read_f32(buf, 4)?;
    let edge = WireEdge::try_from(buf[8]).map_err(|b| ProtocolError::TruncatedPayload {
        context: format!("unknown edge value: {b}"),
    })?;
    Ok(CursorLeaveMessage { x, y, edge })
}

fn decode_clipboard(buf: &[u8]) -> Result<ClipboardMessage, ProtocolError> {
    require_len(buf, 1, "Clipboard content type")?;
    let content_type = ClipboardContentType::try_from(buf[0]).map_err(|b| {
        ProtocolError::TruncatedPayload {
            context: format!("unknown clipboard content type: {b}"),
        }
    })?;
    let (format_hint, offset) = read_string(buf, 1)?;
    require_len(buf, offset + 4, "Clipboard data length")?;
    let data_len = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
    require_len(buf, offset + 4 + data_len, "Clipboard data")?;
    let data = buf[offset + 4..offset + 4 + data_len].to_vec();
    Ok(ClipboardMessage {
        content_type,
        format_hint,
        data,
    })
}

fn decode_error(buf: &[u8]) -> Result<ErrorMessage, ProtocolError> {
    let code = read_i32(buf, 0)?;
    let (description, _) = read_string(buf, 4)?;
    Ok(ErrorMessage { code, description })
}

// ── Byte-level utility helpers ────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::TruncatedPayload {
            context: format!("{context}: need {needed} bytes, got {}", buf.len()),
        })
    } else {
        Ok(())
    }
}

fn read_u8(buf: &[u8], offset: usize) -> Result<u8, ProtocolError> {
    require_len(buf, offset + 1, "u8 field")?;
    Ok(buf[offset])
}

fn read_i32(buf: &[u8], offset: usize) -> Result<i32, ProtocolError> {
    require_len(buf, offset + 4, "i32 field")?;
    Ok(i32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()))
}

fn read_f32(buf: &[u8], offset: usize) -> Result<f32, ProtocolError> {
    require_len(buf, offset + 4, "f32 field")?;
    Ok(f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()))
}

/// Writes a 4-byte little-endian length prefix followed by UTF-8 bytes.
fn write_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Reads a 4-byte length-prefixed UTF-8 string, returning it and the offset
/// of the byte immediately following it.
fn read_string(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    require_len(buf, offset + 4, "string length prefix")?;
    let len = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
    let start = offset + 4;
    require_len(buf, start + len, "string bytes")?;
    let s = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| ProtocolError::TruncatedPayload {
            context: format!("invalid UTF-8 in string: {e}"),
        })?
        .to_string();
    Ok((s, start + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: KvmMessage) {
        let bytes = encode_message(&msg, 1_700_000_000_000).expect("encode");
        let (decoded, consumed) = decode_message(&bytes).expect("decode");
        assert_eq!(decoded, msg);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn roundtrips_handshake() {
        roundtrip(KvmMessage::Handshake(HandshakeMessage {
            machine_id: "a".repeat(32),
            machine_name: "alpha".into(),
            screen_width: 1920,
            screen_height: 1080,
            supports_clipboard: true,
        }));
    }

    #[test]
    fn roundtrips_handshake_ack_rejected() {
        roundtrip(KvmMessage::HandshakeAck(HandshakeAckMessage {
            accepted: false,
            machine_id: "b".repeat(32),
            machine_name: "beta".into(),
            screen_width: 2560,
            screen_height: 1440,
            reject_reason: "unsupported version".into(),
        }));
    }

    #[test]
    fn roundtrips_mouse_move_without_velocity() {
        roundtrip(KvmMessage::Mouse(MouseMessage {
            x: 100,
            y: 200,
            event_type: MouseEventType::Move,
            wheel_delta: 0,
            velocity: None,
        }));
    }

    #[test]
    fn roundtrips_mouse_move_with_velocity() {
        roundtrip(KvmMessage::Mouse(MouseMessage {
            x: 100,
            y: 200,
            event_type: MouseEventType::Move,
            wheel_delta: 0,
            velocity: Some((12.5, -3.0)),
        }));
    }

    #[test]
    fn decodes_13_byte_mouse_payload_with_zero_velocity() {
        // A peer that never sends the extended form must still decode cleanly.
        let msg = KvmMessage::Mouse(MouseMessage {
            x: -5,
            y: 10,
            event_type: MouseEventType::Wheel,
            wheel_delta: 120,
            velocity: None,
        });
        let bytes = encode_message(&msg, 0).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 13);
    }

    #[test]
    fn roundtrips_keyboard() {
        roundtrip(KvmMessage::Keyboard(KeyboardMessage {
            key_code: 65,
            scan_code: 0x1E,
            event_type: KeyEventType::Down,
            is_extended: false,
        }));
    }

    #[test]
    fn roundtrips_cursor_enter() {
        roundtrip(KvmMessage::CursorEnter(CursorEnterMessage {
            x: 0.0,
            y: 0.5,
            edge: WireEdge::Left,
        }));
    }

    #[test]
    fn roundtrips_cursor_leave() {
        roundtrip(KvmMessage::CursorLeave(CursorLeaveMessage {
            x: 1.0,
            y: 0.25,
            edge: WireEdge::Right,
        }));
    }

    #[test]
    fn roundtrips_clipboard() {
        roundtrip(KvmMessage::Clipboard(ClipboardMessage {
            content_type: ClipboardContentType::Text,
            format_hint: "text/plain".into(),
            data: b"hello from the other side".to_vec(),
        }));
    }

    #[test]
    fn roundtrips_empty_payload_messages() {
        roundtrip(KvmMessage::ClipboardRequest);
        roundtrip(KvmMessage::Ping);
        roundtrip(KvmMessage::Pong);
        roundtrip(KvmMessage::Disconnect);
    }

    #[test]
    fn roundtrips_error() {
        roundtrip(KvmMessage::Error(ErrorMessage {
            code: 42,
            description: "truncated payload".into(),
        }));
    }

    #[test]
    fn decode_empty_bytes_returns_truncated() {
        assert!(matches!(
            decode_message(&[]),
            Err(ProtocolError::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn decode_wrong_magic_returns_invalid_magic() {
        let mut bytes = encode_message(&KvmMessage::Ping, 0).unwrap();
        bytes[0] = 0x00;
        bytes[1] = 0x00;
        assert_eq!(decode_message(&bytes), Err(ProtocolError::InvalidMagic));
    }

    #[test]
    fn decode_wrong_version_returns_unsupported_version() {
        let mut bytes = encode_message(&KvmMessage::Ping, 0).unwrap();
        bytes[2] = 0x09;
        assert_eq!(
            decode_message(&bytes),
            Err(ProtocolError::UnsupportedVersion(0x09))
        );
    }

    #[test]
    fn decode_unknown_type_returns_unknown_type() {
        let mut bytes = encode_message(&KvmMessage::Ping, 0).unwrap();
        bytes[3] = 0x05;
        assert_eq!(decode_message(&bytes), Err(ProtocolError::UnknownType(0x05)));
    }

    #[test]
    fn decode_payload_length_exceeding_buffer_returns_truncated() {
        let mut bytes = encode_message(&KvmMessage::Ping, 0).unwrap();
        bytes[4..8].copy_from_slice(&100i32.to_le_bytes());
        assert!(matches!(
            decode_message(&bytes),
            Err(ProtocolError::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn decode_payload_larger_than_max_returns_payload_too_large() {
        let mut bytes = encode_message(&KvmMessage::Ping, 0).unwrap();
        bytes[4..8].copy_from_slice(&((MAX_PAYLOAD_LEN + 1) as i32).to_le_bytes());
        assert!(matches!(
            decode_message(&bytes),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn peek_frame_len_matches_encoded_length() {
        let bytes = encode_message(
            &KvmMessage::Handshake(HandshakeMessage {
                machine_id: "c".repeat(32),
                machine_name: "gamma".into(),
                screen_width: 3840,
                screen_height: 2160,
                supports_clipboard: false,
            }),
            0,
        )
        .unwrap();
        assert_eq!(peek_frame_len(&bytes[..8]).unwrap(), bytes.len());
    }

    #[test]
    fn discovery_datagram_roundtrips() {
        let d = DiscoveryDatagram {
            machine_id: "d".repeat(32),
            machine_name: "delta".into(),
            listen_port: 24800,
            screen_width: 1920,
            screen_height: 1080,
        };
        let bytes = encode_discovery(&d);
        assert_eq!(bytes[0..6], DISCOVERY_MAGIC);
        let decoded = decode_discovery(&bytes).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn discovery_datagram_rejects_foreign_magic() {
        let bytes = b"NOTUS\x00\x01".to_vec();
        assert_eq!(decode_discovery(&bytes), Err(ProtocolError::InvalidMagic));
    }
}
