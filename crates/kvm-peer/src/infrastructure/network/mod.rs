//! Network infrastructure.
//!
//! # Sub-modules
//!
//! - **`discovery`** – UDP broadcast peer presence: every instance both
//!   announces itself and listens for announcements from others.
//! - **`connection`** – One TCP byte stream to a single peer: handshake,
//!   framing, ping/pong liveness.
//! - **`listener`** – Accepts inbound connections and runs the acceptor
//!   side of the handshake.
//! - **`peer_registry`** – In-memory registry of configured peers and their
//!   live connection state.

pub mod connection;
pub mod discovery;
pub mod listener;
pub mod peer_registry;
