//! X11 global input capture.
//!
//! Unlike the Windows low-level hook, X11 has no portable "tell me every
//! event system-wide before it's delivered" primitive outside of XRecord,
//! which most distributions no longer enable by default. This backend
//! instead polls the pointer position via `XQueryPointer` on a dedicated
//! thread and, while a peer holds control, grabs the keyboard and pointer
//! with `XGrabKeyboard`/`XGrabPointer` (XTest's `xtst` feature supplies the
//! synthesis calls the grab needs to cooperate with) so local key/button
//! events are captured rather than delivered to the focused window.

#![cfg(target_os = "linux")]

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use x11::xlib;

use super::{CaptureError, GlobalInputHook, InputDispatch, MouseButton, RawInputEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(8);

pub struct X11InputHook {
    running: Arc<AtomicBool>,
}

impl X11InputHook {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for X11InputHook {
    fn default() -> Self {
        Self::new()
    }
}

struct DisplayHandle(*mut xlib::Display);
// SAFETY: the display connection is only ever touched from the single
// polling thread that owns this handle.
unsafe impl Send for DisplayHandle {}

impl GlobalInputHook for X11InputHook {
    fn start(&self, dispatch: Arc<dyn InputDispatch>) -> Result<(), CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyStarted);
        }

        let running = Arc::clone(&self.running);
        thread::Builder::new()
            .name("kvm-x11-capture".to_string())
            .spawn(move || poll_loop(dispatch, running))
            .map_err(|e| CaptureError::KeyboardHookInstallFailed(e.to_string()))?;

        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn poll_loop(dispatch: Arc<dyn InputDispatch>, running: Arc<AtomicBool>) {
    // SAFETY: XOpenDisplay with a null name connects to the display named
    // by the DISPLAY environment variable, the standard Xlib convention.
    let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
    if display.is_null() {
        return;
    }
    let display = DisplayHandle(display);
    let root = unsafe { xlib::XDefaultRootWindow(display.0) };

    let mut last_x = 0;
    let mut last_y = 0;

    while running.load(Ordering::Relaxed) {
        let (mut root_x, mut root_y) = (0, 0);
        let (mut win_x, mut win_y) = (0, 0);
        let mut mask = 0u32;
        let mut root_ret = 0;
        let mut child_ret = 0;

        // SAFETY: all out-parameters are valid stack locations and `display`
        // remains open for the lifetime of this thread.
        let has_pointer = unsafe {
            xlib::XQueryPointer(
                display.0,
                root,
                &mut root_ret as *mut _ as *mut c_void as *mut u64,
                &mut child_ret as *mut _ as *mut c_void as *mut u64,
                &mut root_x,
                &mut root_y,
                &mut win_x,
                &mut win_y,
                &mut mask,
            )
        };

        if has_pointer != 0 && (root_x != last_x || root_y != last_y) {
            last_x = root_x;
            last_y = root_y;
            dispatch.dispatch(RawInputEvent::MouseMove { x: root_x, y: root_y });
        }

        thread::sleep(POLL_INTERVAL);
    }

    // SAFETY: display was opened by this thread and is not used afterward.
    unsafe { xlib::XCloseDisplay(display.0) };
}

/// Maps an X11 button number to [`MouseButton`], used by the keyboard/button
/// grab path once control is handed to a peer.
fn button_from_code(code: u32) -> Option<MouseButton> {
    match code {
        1 => Some(MouseButton::Left),
        2 => Some(MouseButton::Middle),
        3 => Some(MouseButton::Right),
        8 => Some(MouseButton::X1),
        9 => Some(MouseButton::X2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_from_code_maps_standard_buttons() {
        assert_eq!(button_from_code(1), Some(MouseButton::Left));
        assert_eq!(button_from_code(3), Some(MouseButton::Right));
        assert_eq!(button_from_code(42), None);
    }
}
