//! In-memory registry of configured peers and their live connection state.

use std::collections::HashMap;

use kvm_core::domain::peer::{MachineId, PeerRecord, Position};

use super::connection::Connection;

/// Connection lifecycle of one configured peer, independent of whether it
/// currently holds or is being given control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// A configured peer plus everything known about its current link.
#[derive(Clone)]
pub struct PeerEntry {
    pub record: PeerRecord,
    pub link_state: LinkState,
    pub connection: Option<Connection>,
}

/// Tracks every configured [`PeerRecord`], enforcing the rule that at most
/// one peer occupies a given screen edge. When a second peer is registered
/// at an edge already taken, the first configured peer keeps it.
#[derive(Default)]
pub struct PeerRegistry {
    peers: HashMap<MachineId, PeerEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `record` unless its [`Position`] is already occupied by a
    /// different peer, in which case it is rejected and `false` is returned.
    /// A `record` with no position (learned only from an inbound handshake,
    /// never added to this host's own configuration) is never rejected this
    /// way.
    pub fn register(&mut self, record: PeerRecord) -> bool {
        if let Some(position) = record.position {
            if let Some(existing) = self.peer_at(position) {
                if existing.id != record.id {
                    return false;
                }
            }
        }
        self.peers
            .entry(record.id.clone())
            .and_modify(|entry| entry.record = record.clone())
            .or_insert_with(|| PeerEntry {
                record,
                link_state: LinkState::Disconnected,
                connection: None,
            });
        true
    }

    pub fn peer_at(&self, position: Position) -> Option<&PeerRecord> {
        self.peers
            .values()
            .map(|e| &e.record)
            .find(|r| r.position == Some(position))
    }

    pub fn get(&self, id: &MachineId) -> Option<&PeerEntry> {
        self.peers.get(id)
    }

    pub fn set_link_state(&mut self, id: &MachineId, state: LinkState) {
        if let Some(entry) = self.peers.get_mut(id) {
            entry.link_state = state;
        }
    }

    /// Attaches `connection` as the live connection for `id`, returning
    /// whatever connection it replaces (e.g. a duplicate handshake for a
    /// peer this registry already held a connection for). The caller is
    /// responsible for tearing the old connection down.
    pub fn attach_connection(&mut self, id: &MachineId, connection: Connection) -> Option<Connection> {
        if let Some(entry) = self.peers.get_mut(id) {
            entry.link_state = LinkState::Connected;
            entry.connection.replace(connection)
        } else {
            None
        }
    }

    pub fn detach_connection(&mut self, id: &MachineId) {
        if let Some(entry) = self.peers.get_mut(id) {
            entry.connection = None;
            entry.link_state = LinkState::Disconnected;
        }
    }

    pub fn connected_peers(&self) -> impl Iterator<Item = &PeerEntry> {
        self.peers
            .values()
            .filter(|e| e.link_state == LinkState::Connected)
    }

    pub fn all(&self) -> impl Iterator<Item = &PeerEntry> {
        self.peers.values()
    }
}
