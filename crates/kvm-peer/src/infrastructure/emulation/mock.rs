//! Mock input synthesizer for unit testing the control core without
//! touching real OS input.

use std::sync::Mutex;

use kvm_core::protocol::messages::{KeyboardMessage, MouseMessage};

use super::{EmulationError, InputSynthesis};

#[derive(Default)]
pub struct MockSynthesizer {
    pub mouse_events: Mutex<Vec<MouseMessage>>,
    pub keyboard_events: Mutex<Vec<KeyboardMessage>>,
    pub cursor_hidden: Mutex<bool>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSynthesis for MockSynthesizer {
    fn apply_mouse(&self, event: &MouseMessage) -> Result<(), EmulationError> {
        self.mouse_events.lock().expect("lock poisoned").push(event.clone());
        Ok(())
    }

    fn apply_keyboard(&self, event: &KeyboardMessage) -> Result<(), EmulationError> {
        self.keyboard_events.lock().expect("lock poisoned").push(event.clone());
        Ok(())
    }

    fn hide_cursor(&self) -> Result<(), EmulationError> {
        *self.cursor_hidden.lock().expect("lock poisoned") = true;
        Ok(())
    }

    fn show_cursor(&self) -> Result<(), EmulationError> {
        *self.cursor_hidden.lock().expect("lock poisoned") = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvm_core::protocol::messages::{KeyEventType, MouseEventType};

    #[test]
    fn mock_synthesizer_records_mouse_events() {
        let mock = MockSynthesizer::new();
        mock.apply_mouse(&MouseMessage {
            x: 1,
            y: 2,
            event_type: MouseEventType::Move,
            wheel_delta: 0,
            velocity: None,
        })
        .unwrap();
        assert_eq!(mock.mouse_events.lock().unwrap().len(), 1);
    }

    #[test]
    fn mock_synthesizer_records_keyboard_events() {
        let mock = MockSynthesizer::new();
        mock.apply_keyboard(&KeyboardMessage {
            key_code: 0x41,
            scan_code: 0x1E,
            event_type: KeyEventType::Down,
            is_extended: false,
        })
        .unwrap();
        assert_eq!(mock.keyboard_events.lock().unwrap().len(), 1);
    }
}
