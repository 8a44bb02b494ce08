//! The control core's mutually exclusive states (§3).

use crate::domain::peer::MachineId;

/// Mutually exclusive states of the control core. Transitions occur only at
/// well-defined events (§4.7).
///
/// - `Idle`: local input is not suppressed; the cursor is free.
/// - `Controlling(p)`: the physical cursor is held at a fixed anchor; local
///   input is suppressed from other applications and forwarded to `p`.
/// - `Controlled(p)`: local input is suppressed and dropped; incoming input
///   from `p` is synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Controlling(MachineId),
    Controlled(MachineId),
}

impl ControlState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ControlState::Idle)
    }

    pub fn controlling_peer(&self) -> Option<&MachineId> {
        match self {
            ControlState::Controlling(id) => Some(id),
            _ => None,
        }
    }

    pub fn controlled_by_peer(&self) -> Option<&MachineId> {
        match self {
            ControlState::Controlled(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_has_no_controlling_or_controlled_peer() {
        let state = ControlState::Idle;
        assert!(state.is_idle());
        assert_eq!(state.controlling_peer(), None);
        assert_eq!(state.controlled_by_peer(), None);
    }

    #[test]
    fn controlling_exposes_peer_id() {
        let state = ControlState::Controlling("peer-1".to_string());
        assert_eq!(state.controlling_peer(), Some(&"peer-1".to_string()));
        assert_eq!(state.controlled_by_peer(), None);
    }
}
