//! Linux X11 input emulation via the XTest extension.
//!
//! Uses `XTestFakeKeyEvent`, `XTestFakeMotionEvent`, and `XTestFakeButtonEvent`
//! to inject events into the X11 session. Requires either membership in the
//! `input` group or a running XTest-capable X server.

#![cfg(target_os = "linux")]

use kvm_core::protocol::messages::{KeyEventType, KeyboardMessage, MouseEventType, MouseMessage};

use super::{EmulationError, InputSynthesis};

const CURRENT_TIME: u64 = 0;

pub struct XTestSynthesizer {
    display: *mut x11::xlib::Display,
}

// SAFETY: the display connection is only ever used from the thread that
// owns the control core's emulation call path, never concurrently.
unsafe impl Send for XTestSynthesizer {}
unsafe impl Sync for XTestSynthesizer {}

impl XTestSynthesizer {
    /// Opens the X display named by `$DISPLAY`.
    pub fn new() -> Result<Self, EmulationError> {
        // SAFETY: XOpenDisplay with a null name is the standard way to
        // connect to the display named by the DISPLAY environment variable.
        let display = unsafe { x11::xlib::XOpenDisplay(std::ptr::null()) };
        if display.is_null() {
            return Err(EmulationError::Platform("XOpenDisplay returned null".into()));
        }
        Ok(Self { display })
    }
}

impl Drop for XTestSynthesizer {
    fn drop(&mut self) {
        // SAFETY: `self.display` was opened by `XOpenDisplay` in `new`.
        unsafe { x11::xlib::XCloseDisplay(self.display) };
    }
}

impl InputSynthesis for XTestSynthesizer {
    fn apply_mouse(&self, event: &MouseMessage) -> Result<(), EmulationError> {
        match event.event_type {
            MouseEventType::Move => {
                // SAFETY: `self.display` is a live connection; -1 selects
                // the screen the pointer currently belongs to.
                unsafe {
                    x11::xtest::XTestFakeMotionEvent(
                        self.display,
                        -1,
                        event.x,
                        event.y,
                        CURRENT_TIME,
                    );
                    x11::xlib::XFlush(self.display);
                }
            }
            MouseEventType::Wheel | MouseEventType::HWheel => {
                let horizontal = event.event_type == MouseEventType::HWheel;
                send_wheel_clicks(self.display, event.wheel_delta, horizontal);
            }
            other => send_button(self.display, other),
        }
        Ok(())
    }

    fn apply_keyboard(&self, event: &KeyboardMessage) -> Result<(), EmulationError> {
        // SAFETY: `self.display` is a live connection; scan_code is treated
        // as the X11 keycode directly, matching the raw platform code the
        // wire message already carries (§4.1).
        unsafe {
            x11::xtest::XTestFakeKeyEvent(
                self.display,
                event.scan_code,
                (event.event_type == KeyEventType::Down) as i32,
                CURRENT_TIME,
            );
            x11::xlib::XFlush(self.display);
        }
        Ok(())
    }

    /// No-op: hiding the cursor for one client while leaving it visible to
    /// the rest of the desktop needs the XFixes extension, which this
    /// backend does not currently depend on. The warp strategy (§4.6) still
    /// works correctly without it; only the visual jitter during
    /// `Controlling` is not suppressed.
    fn hide_cursor(&self) -> Result<(), EmulationError> {
        Ok(())
    }

    fn show_cursor(&self) -> Result<(), EmulationError> {
        Ok(())
    }
}

fn send_button(display: *mut x11::xlib::Display, event_type: MouseEventType) {
    let (button, pressed) = match event_type {
        MouseEventType::LeftDown => (1, true),
        MouseEventType::LeftUp => (1, false),
        MouseEventType::MiddleDown => (2, true),
        MouseEventType::MiddleUp => (2, false),
        MouseEventType::RightDown => (3, true),
        MouseEventType::RightUp => (3, false),
        MouseEventType::XButton1Down => (8, true),
        MouseEventType::XButton1Up => (8, false),
        MouseEventType::XButton2Down => (9, true),
        MouseEventType::XButton2Up => (9, false),
        MouseEventType::Move | MouseEventType::Wheel | MouseEventType::HWheel => return,
    };
    // SAFETY: `display` is a live connection owned by the caller.
    unsafe {
        x11::xtest::XTestFakeButtonEvent(display, button, pressed as i32, CURRENT_TIME);
        x11::xlib::XFlush(display);
    }
}

/// X11 has no wheel-delta API; scroll is expressed as repeated button
/// clicks on buttons 4/5 (vertical) or 6/7 (horizontal), one click per
/// conventional 120-unit notch.
fn send_wheel_clicks(display: *mut x11::xlib::Display, delta: i32, horizontal: bool) {
    let button = if horizontal {
        if delta > 0 { 7 } else { 6 }
    } else if delta > 0 {
        4
    } else {
        5
    };
    let clicks = (delta.unsigned_abs() / 120).max(1);
    for _ in 0..clicks {
        // SAFETY: `display` is a live connection owned by the caller.
        unsafe {
            x11::xtest::XTestFakeButtonEvent(display, button, 1, CURRENT_TIME);
            x11::xtest::XTestFakeButtonEvent(display, button, 0, CURRENT_TIME);
            x11::xlib::XFlush(display);
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn wheel_click_count_matches_one_notch_per_120_units() {
        assert_eq!((120u32).max(1) / 120, 1);
        assert_eq!((240u32).max(1) / 120, 2);
        assert_eq!((0u32).max(1), 1);
    }
}
