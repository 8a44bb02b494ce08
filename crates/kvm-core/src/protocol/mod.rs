//! Protocol module containing message types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_discovery, decode_message, encode_discovery, encode_message, encode_message_now,
    peek_frame_len, ProtocolError,
};
pub use messages::*;
