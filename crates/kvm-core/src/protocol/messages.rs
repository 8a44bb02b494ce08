//! Message catalog for the KVM-Over-IP wire protocol.
//!
//! Every message that can appear after the 16-byte frame header (see
//! [`crate::protocol::codec`]) has a corresponding variant here. Field order
//! within each struct matches the wire layout exactly — these types are
//! encoded/decoded by hand in `codec.rs`, not derived from `serde`'s binary
//! form, though they still derive `Serialize`/`Deserialize` for use in tests,
//! logs, and any future alternate transport.

use serde::{Deserialize, Serialize};

/// Magic bytes that open every frame: ASCII `"MS"`.
pub const MAGIC: [u8; 2] = [0x4D, 0x53];

/// Wire protocol version understood by this build.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the frame header in bytes: magic(2) + version(1) + type(1) +
/// payload_length(4) + timestamp_millis(8).
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single frame's payload, matching the codec round-trip
/// invariant that anything larger decodes to [`crate::protocol::ProtocolError::PayloadTooLarge`].
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Discovery datagram magic: ASCII `"MSDISC"`.
pub const DISCOVERY_MAGIC: [u8; 6] = *b"MSDISC";

/// Identifies a peer machine. Conventionally a 32-character lowercase hex
/// string (see `uuid::Uuid::simple`), but the wire format treats it as an
/// opaque length-prefixed string.
pub type MachineId = String;

/// One byte identifying the message kind, carried at header offset 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Handshake = 0x01,
    HandshakeAck = 0x02,
    Mouse = 0x10,
    Keyboard = 0x11,
    CursorEnter = 0x20,
    CursorLeave = 0x21,
    Clipboard = 0x30,
    ClipboardRequest = 0x31,
    Ping = 0x40,
    Pong = 0x41,
    Disconnect = 0xF0,
    Error = 0xFF,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageType::Handshake),
            0x02 => Ok(MessageType::HandshakeAck),
            0x10 => Ok(MessageType::Mouse),
            0x11 => Ok(MessageType::Keyboard),
            0x20 => Ok(MessageType::CursorEnter),
            0x21 => Ok(MessageType::CursorLeave),
            0x30 => Ok(MessageType::Clipboard),
            0x31 => Ok(MessageType::ClipboardRequest),
            0x40 => Ok(MessageType::Ping),
            0x41 => Ok(MessageType::Pong),
            0xF0 => Ok(MessageType::Disconnect),
            0xFF => Ok(MessageType::Error),
            other => Err(other),
        }
    }
}

/// Sent by the dialing side immediately after the stream opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    pub machine_id: MachineId,
    pub machine_name: String,
    pub screen_width: i32,
    pub screen_height: i32,
    pub supports_clipboard: bool,
}

/// Sent by the accepting side in reply to a [`HandshakeMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeAckMessage {
    pub accepted: bool,
    pub machine_id: MachineId,
    pub machine_name: String,
    pub screen_width: i32,
    pub screen_height: i32,
    /// Empty when `accepted` is true.
    pub reject_reason: String,
}

/// Mouse event kinds, carried in [`MouseMessage::event_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseEventType {
    Move = 0,
    LeftDown = 1,
    LeftUp = 2,
    RightDown = 3,
    RightUp = 4,
    MiddleDown = 5,
    MiddleUp = 6,
    Wheel = 7,
    HWheel = 8,
    XButton1Down = 9,
    XButton1Up = 10,
    XButton2Down = 11,
    XButton2Up = 12,
}

impl TryFrom<u8> for MouseEventType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MouseEventType::Move),
            1 => Ok(MouseEventType::LeftDown),
            2 => Ok(MouseEventType::LeftUp),
            3 => Ok(MouseEventType::RightDown),
            4 => Ok(MouseEventType::RightUp),
            5 => Ok(MouseEventType::MiddleDown),
            6 => Ok(MouseEventType::MiddleUp),
            7 => Ok(MouseEventType::Wheel),
            8 => Ok(MouseEventType::HWheel),
            9 => Ok(MouseEventType::XButton1Down),
            10 => Ok(MouseEventType::XButton1Up),
            11 => Ok(MouseEventType::XButton2Down),
            12 => Ok(MouseEventType::XButton2Up),
            other => Err(other),
        }
    }
}

/// A mouse move, button, or wheel event in the receiver's pixel space.
///
/// The base payload is 13 bytes (`X`, `Y`, `EventType`, `WheelDelta`). An
/// extended 21-byte form additionally carries `VelocityX`/`VelocityY`;
/// decoders accept both lengths and treat a missing velocity as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseMessage {
    pub x: i32,
    pub y: i32,
    pub event_type: MouseEventType,
    pub wheel_delta: i32,
    pub velocity: Option<(f32, f32)>,
}

/// Keyboard event kinds, carried in [`KeyboardMessage::event_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyEventType {
    Down = 0,
    Up = 1,
}

impl TryFrom<u8> for KeyEventType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyEventType::Down),
            1 => Ok(KeyEventType::Up),
            other => Err(other),
        }
    }
}

/// A single keyboard event, carrying the sender's raw virtual-key and
/// scan code — translation to a portable form happens at the platform
/// capture/emulation boundary, not on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyboardMessage {
    pub key_code: i32,
    pub scan_code: u32,
    pub event_type: KeyEventType,
    pub is_extended: bool,
}

/// The screen edge a cursor is crossing, expressed in the receiver's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WireEdge {
    Left = 0,
    Right = 1,
    Top = 2,
    Bottom = 3,
}

impl TryFrom<u8> for WireEdge {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WireEdge::Left),
            1 => Ok(WireEdge::Right),
            2 => Ok(WireEdge::Top),
            3 => Ok(WireEdge::Bottom),
            other => Err(other),
        }
    }
}

/// Notifies the receiver that control is entering from `edge`, at a
/// normalized position along that edge (`0.0..=1.0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorEnterMessage {
    pub x: f32,
    pub y: f32,
    pub edge: WireEdge,
}

/// Notifies the receiver that control is leaving back out through `edge`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorLeaveMessage {
    pub x: f32,
    pub y: f32,
    pub edge: WireEdge,
}

/// Clipboard content kind, carried in [`ClipboardMessage::content_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClipboardContentType {
    Text = 0,
    Html = 1,
    Image = 2,
    Files = 3,
}

impl TryFrom<u8> for ClipboardContentType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ClipboardContentType::Text),
            1 => Ok(ClipboardContentType::Html),
            2 => Ok(ClipboardContentType::Image),
            3 => Ok(ClipboardContentType::Files),
            other => Err(other),
        }
    }
}

/// Clipboard content broadcast to every live connection on a local change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardMessage {
    pub content_type: ClipboardContentType,
    pub format_hint: String,
    pub data: Vec<u8>,
}

/// A reported protocol-level error, closing the connection on receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: i32,
    pub description: String,
}

/// The decoded form of any frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvmMessage {
    Handshake(HandshakeMessage),
    HandshakeAck(HandshakeAckMessage),
    Mouse(MouseMessage),
    Keyboard(KeyboardMessage),
    CursorEnter(CursorEnterMessage),
    CursorLeave(CursorLeaveMessage),
    Clipboard(ClipboardMessage),
    ClipboardRequest,
    Ping,
    Pong,
    Disconnect,
    Error(ErrorMessage),
}

impl KvmMessage {
    /// Returns the [`MessageType`] tag this message encodes to.
    pub fn message_type(&self) -> MessageType {
        match self {
            KvmMessage::Handshake(_) => MessageType::Handshake,
            KvmMessage::HandshakeAck(_) => MessageType::HandshakeAck,
            KvmMessage::Mouse(_) => MessageType::Mouse,
            KvmMessage::Keyboard(_) => MessageType::Keyboard,
            KvmMessage::CursorEnter(_) => MessageType::CursorEnter,
            KvmMessage::CursorLeave(_) => MessageType::CursorLeave,
            KvmMessage::Clipboard(_) => MessageType::Clipboard,
            KvmMessage::ClipboardRequest => MessageType::ClipboardRequest,
            KvmMessage::Ping => MessageType::Ping,
            KvmMessage::Pong => MessageType::Pong,
            KvmMessage::Disconnect => MessageType::Disconnect,
            KvmMessage::Error(_) => MessageType::Error,
        }
    }
}

/// Decoded form of the UDP discovery datagram (see `codec::encode_discovery`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryDatagram {
    pub machine_id: MachineId,
    pub machine_name: String,
    pub listen_port: i32,
    pub screen_width: i32,
    pub screen_height: i32,
}
