//! Peer identity and configuration records (§3).

use serde::{Deserialize, Serialize};

/// Stable identity for a host: opaque, conventionally 32 lowercase hex
/// characters (see `uuid::Uuid::simple`). Assigned once on first run and
/// persisted externally; immutable for the process lifetime.
pub type MachineId = String;

/// Where a peer's screen sits relative to this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Left,
    Right,
    Top,
    Bottom,
}

impl Position {
    /// The local screen edge the cursor reappears at when control returns
    /// from a peer at this position.
    pub fn local_edge(self) -> crate::domain::geometry::Edge {
        use crate::domain::geometry::Edge;
        match self {
            Position::Left => Edge::Left,
            Position::Right => Edge::Right,
            Position::Top => Edge::Top,
            Position::Bottom => Edge::Bottom,
        }
    }
}

/// A configured or discovered peer.
///
/// Invariant (enforced by the caller that builds the peer set, not by this
/// type): at most one configured peer occupies each [`Position`] relative to
/// a given host.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub id: MachineId,
    pub display_name: String,
    pub address: String,
    pub port: u16,
    /// `None` for a peer known only because it completed an inbound
    /// handshake without appearing in this host's own peer configuration
    /// (configuration need not be symmetric between two peers). Such a peer
    /// is never selected by edge-crossing lookups, but can still be
    /// controlled by, or do the controlling of, this host.
    pub position: Option<Position>,
    /// Reserved for future alignment offsets along the shared edge; not
    /// consumed by the control core.
    pub offset_x: i32,
    pub offset_y: i32,
    /// Updated at handshake completion; `None` until a handshake succeeds.
    pub remote_screen_width: Option<i32>,
    pub remote_screen_height: Option<i32>,
    /// `Some` only for peers learned through discovery rather than explicit
    /// configuration; used for the 30 s staleness eviction in §4.2.
    pub last_seen_millis: Option<i64>,
}

impl PeerRecord {
    /// Builds a `PeerRecord` from static configuration, with no discovery
    /// or handshake data yet.
    pub fn from_config(
        id: MachineId,
        display_name: String,
        address: String,
        port: u16,
        position: Position,
        offset_x: i32,
        offset_y: i32,
    ) -> Self {
        Self {
            id,
            display_name,
            address,
            port,
            position: Some(position),
            offset_x,
            offset_y,
            remote_screen_width: None,
            remote_screen_height: None,
            last_seen_millis: None,
        }
    }

    /// Builds a minimal record for a peer that completed a handshake without
    /// being present in this host's own peer configuration. It has no
    /// assigned edge and no alignment offsets until this host's operator
    /// adds it to configuration.
    pub fn from_handshake(id: MachineId, display_name: String, address: String, port: u16) -> Self {
        Self {
            id,
            display_name,
            address,
            port,
            position: None,
            offset_x: 0,
            offset_y: 0,
            remote_screen_width: None,
            remote_screen_height: None,
            last_seen_millis: None,
        }
    }

    pub fn record_handshake(&mut self, screen_width: i32, screen_height: i32) {
        self.remote_screen_width = Some(screen_width);
        self.remote_screen_height = Some(screen_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Edge;

    #[test]
    fn position_local_edge_matches_compass_direction() {
        assert_eq!(Position::Left.local_edge(), Edge::Left);
        assert_eq!(Position::Right.local_edge(), Edge::Right);
        assert_eq!(Position::Top.local_edge(), Edge::Top);
        assert_eq!(Position::Bottom.local_edge(), Edge::Bottom);
    }

    #[test]
    fn from_handshake_builds_a_position_less_record() {
        let peer = PeerRecord::from_handshake(
            "c".repeat(32),
            "gamma".into(),
            "192.168.1.20".into(),
            24800,
        );
        assert_eq!(peer.position, None);
        assert_eq!(peer.offset_x, 0);
        assert_eq!(peer.offset_y, 0);
    }

    #[test]
    fn record_handshake_updates_remote_dimensions() {
        let mut peer = PeerRecord::from_config(
            "a".repeat(32),
            "alpha".into(),
            "192.168.1.10".into(),
            24800,
            Position::Right,
            0,
            0,
        );
        assert_eq!(peer.remote_screen_width, None);
        peer.record_handshake(2560, 1440);
        assert_eq!(peer.remote_screen_width, Some(2560));
        assert_eq!(peer.remote_screen_height, Some(1440));
    }
}
