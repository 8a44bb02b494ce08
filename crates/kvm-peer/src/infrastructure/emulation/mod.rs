//! Input synthesis (§6 `InputSynthesis`): replays a [`MouseMessage`] or
//! [`KeyboardMessage`] received from a controlling peer as real OS input.

use std::sync::{Arc, Mutex};

use kvm_core::protocol::messages::{KeyboardMessage, MouseMessage};
use thiserror::Error;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("platform error: {0}")]
    Platform(String),
}

/// Platform-agnostic input synthesis trait; one implementation per OS plus
/// [`mock::MockSynthesizer`] for tests.
pub trait InputSynthesis: Send + Sync {
    fn apply_mouse(&self, event: &MouseMessage) -> Result<(), EmulationError>;
    fn apply_keyboard(&self, event: &KeyboardMessage) -> Result<(), EmulationError>;

    /// Hides the system cursor while this host is `Controlling` a peer
    /// (§4.7.2) so the locally-anchored pointer doesn't visibly jitter.
    fn hide_cursor(&self) -> Result<(), EmulationError>;

    /// Restores the system cursor on `EndRemoteControl` (§4.7.4).
    fn show_cursor(&self) -> Result<(), EmulationError>;
}

/// Filters consecutive duplicate mouse-move positions so a noisy sender
/// doesn't inject the same cursor warp twice.
#[derive(Default)]
struct DedupFilter {
    last_mouse_pos: Option<(i32, i32)>,
}

impl DedupFilter {
    fn should_send_mouse_move(&mut self, x: i32, y: i32) -> bool {
        if self.last_mouse_pos == Some((x, y)) {
            return false;
        }
        self.last_mouse_pos = Some((x, y));
        true
    }

    fn reset(&mut self) {
        self.last_mouse_pos = None;
    }
}

/// Dispatches decoded wire messages to a [`InputSynthesis`] backend,
/// deduplicating consecutive identical mouse-move positions.
pub struct EmulationService {
    synthesizer: Arc<dyn InputSynthesis>,
    dedup: Mutex<DedupFilter>,
}

impl EmulationService {
    pub fn new(synthesizer: Arc<dyn InputSynthesis>) -> Self {
        Self {
            synthesizer,
            dedup: Mutex::new(DedupFilter::default()),
        }
    }

    pub fn handle_mouse(&self, event: &MouseMessage) -> Result<(), EmulationError> {
        use kvm_core::protocol::messages::MouseEventType;
        if event.event_type == MouseEventType::Move {
            let mut dedup = self.dedup.lock().expect("lock poisoned");
            if !dedup.should_send_mouse_move(event.x, event.y) {
                return Ok(());
            }
        }
        self.synthesizer.apply_mouse(event)
    }

    pub fn handle_keyboard(&self, event: &KeyboardMessage) -> Result<(), EmulationError> {
        self.synthesizer.apply_keyboard(event)
    }

    /// Clears dedup state; called when control is handed to this host again
    /// after a gap, so a stale cached position doesn't suppress a move.
    pub fn reset(&self) {
        self.dedup.lock().expect("lock poisoned").reset();
    }

    /// Moves the physical cursor directly, bypassing the move-dedup filter.
    /// Used by the control core for the anchor warp and the release-to-edge
    /// placement (§4.6, §4.7.4), which are distinct from applying an
    /// incoming remote `Mouse` message and must never be suppressed by
    /// stale dedup state from that path.
    pub fn move_cursor_absolute(&self, x: i32, y: i32) -> Result<(), EmulationError> {
        use kvm_core::protocol::messages::MouseEventType;
        self.synthesizer.apply_mouse(&MouseMessage {
            x,
            y,
            event_type: MouseEventType::Move,
            wheel_delta: 0,
            velocity: None,
        })
    }

    pub fn hide_cursor(&self) -> Result<(), EmulationError> {
        self.synthesizer.hide_cursor()
    }

    pub fn show_cursor(&self) -> Result<(), EmulationError> {
        self.synthesizer.show_cursor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvm_core::protocol::messages::MouseEventType;

    #[derive(Default)]
    struct RecordingSynthesizer {
        mouse_calls: Mutex<Vec<MouseMessage>>,
    }

    impl InputSynthesis for RecordingSynthesizer {
        fn apply_mouse(&self, event: &MouseMessage) -> Result<(), EmulationError> {
            self.mouse_calls.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn hide_cursor(&self) -> Result<(), EmulationError> {
            Ok(())
        }

        fn show_cursor(&self) -> Result<(), EmulationError> {
            Ok(())
        }

        fn apply_keyboard(&self, _event: &KeyboardMessage) -> Result<(), EmulationError> {
            Ok(())
        }
    }

    fn mouse_move(x: i32, y: i32) -> MouseMessage {
        MouseMessage {
            x,
            y,
            event_type: MouseEventType::Move,
            wheel_delta: 0,
            velocity: None,
        }
    }

    #[test]
    fn duplicate_consecutive_moves_are_suppressed() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let service = EmulationService::new(Arc::clone(&synth) as Arc<dyn InputSynthesis>);

        service.handle_mouse(&mouse_move(100, 200)).unwrap();
        service.handle_mouse(&mouse_move(100, 200)).unwrap();

        assert_eq!(synth.mouse_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn distinct_moves_both_pass_through() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let service = EmulationService::new(Arc::clone(&synth) as Arc<dyn InputSynthesis>);

        service.handle_mouse(&mouse_move(100, 200)).unwrap();
        service.handle_mouse(&mouse_move(101, 200)).unwrap();

        assert_eq!(synth.mouse_calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn reset_allows_the_same_position_to_pass_through_again() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let service = EmulationService::new(Arc::clone(&synth) as Arc<dyn InputSynthesis>);

        service.handle_mouse(&mouse_move(100, 200)).unwrap();
        service.reset();
        service.handle_mouse(&mouse_move(100, 200)).unwrap();

        assert_eq!(synth.mouse_calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn non_move_events_are_never_deduplicated() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let service = EmulationService::new(Arc::clone(&synth) as Arc<dyn InputSynthesis>);

        let click = MouseMessage {
            x: 5,
            y: 5,
            event_type: MouseEventType::LeftDown,
            wheel_delta: 0,
            velocity: None,
        };
        service.handle_mouse(&click).unwrap();
        service.handle_mouse(&click).unwrap();

        assert_eq!(synth.mouse_calls.lock().unwrap().len(), 2);
    }
}
