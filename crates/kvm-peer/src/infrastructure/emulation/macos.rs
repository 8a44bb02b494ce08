//! macOS CoreGraphics input emulation.
//!
//! Uses `CGEvent::new_keyboard_event`/`new_mouse_event` plus `CGEvent::post`
//! at `kCGHIDEventTap` to inject events. Requires the process to hold the
//! Accessibility permission.

#![cfg(target_os = "macos")]

use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventType, CGMouseButton, ScrollEventUnit,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;

use kvm_core::protocol::messages::{KeyEventType, KeyboardMessage, MouseEventType, MouseMessage};

use super::{EmulationError, InputSynthesis};

pub struct CgEventSynthesizer {
    source: CGEventSource,
}

impl CgEventSynthesizer {
    pub fn new() -> Result<Self, EmulationError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| EmulationError::Platform("failed to create CGEventSource".into()))?;
        Ok(Self { source })
    }
}

impl InputSynthesis for CgEventSynthesizer {
    fn apply_mouse(&self, event: &MouseMessage) -> Result<(), EmulationError> {
        let point = CGPoint::new(event.x as f64, event.y as f64);
        let cg_event = match event.event_type {
            MouseEventType::Move => CGEvent::new_mouse_event(
                self.source.clone(),
                CGEventType::MouseMoved,
                point,
                CGMouseButton::Left,
            ),
            MouseEventType::Wheel | MouseEventType::HWheel => {
                let (wheel1, wheel2) = if event.event_type == MouseEventType::HWheel {
                    (0, event.wheel_delta)
                } else {
                    (event.wheel_delta, 0)
                };
                CGEvent::new_scroll_event(
                    self.source.clone(),
                    ScrollEventUnit::PIXEL,
                    2,
                    wheel1,
                    wheel2,
                    0,
                )
            }
            other => button_event(&self.source, other, point),
        }
        .map_err(|_| EmulationError::Platform("failed to construct CGEvent".into()))?;

        cg_event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn apply_keyboard(&self, event: &KeyboardMessage) -> Result<(), EmulationError> {
        let cg_event = CGEvent::new_keyboard_event(
            self.source.clone(),
            event.scan_code as u16,
            event.event_type == KeyEventType::Down,
        )
        .map_err(|_| EmulationError::Platform("failed to construct CGEvent".into()))?;
        cg_event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn hide_cursor(&self) -> Result<(), EmulationError> {
        CGDisplay::main()
            .hide_cursor()
            .map_err(|_| EmulationError::Platform("CGDisplayHideCursor failed".into()))
    }

    fn show_cursor(&self) -> Result<(), EmulationError> {
        CGDisplay::main()
            .show_cursor()
            .map_err(|_| EmulationError::Platform("CGDisplayShowCursor failed".into()))
    }
}

fn button_event(
    source: &CGEventSource,
    event_type: MouseEventType,
    point: CGPoint,
) -> Result<CGEvent, ()> {
    let (cg_type, button) = match event_type {
        MouseEventType::LeftDown => (CGEventType::LeftMouseDown, CGMouseButton::Left),
        MouseEventType::LeftUp => (CGEventType::LeftMouseUp, CGMouseButton::Left),
        MouseEventType::RightDown => (CGEventType::RightMouseDown, CGMouseButton::Right),
        MouseEventType::RightUp => (CGEventType::RightMouseUp, CGMouseButton::Right),
        MouseEventType::MiddleDown => (CGEventType::OtherMouseDown, CGMouseButton::Center),
        MouseEventType::MiddleUp => (CGEventType::OtherMouseUp, CGMouseButton::Center),
        // CoreGraphics has no dedicated X-button event type; treated as
        // "other" mouse button events same as the middle button.
        MouseEventType::XButton1Down | MouseEventType::XButton2Down => {
            (CGEventType::OtherMouseDown, CGMouseButton::Center)
        }
        MouseEventType::XButton1Up | MouseEventType::XButton2Up => {
            (CGEventType::OtherMouseUp, CGMouseButton::Center)
        }
        MouseEventType::Move | MouseEventType::Wheel | MouseEventType::HWheel => {
            return Err(())
        }
    };
    CGEvent::new_mouse_event(source.clone(), cg_type, point, button)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_event_rejects_non_button_event_types() {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState);
        if let Ok(source) = source {
            assert!(button_event(&source, MouseEventType::Move, CGPoint::new(0.0, 0.0)).is_err());
        }
    }
}
