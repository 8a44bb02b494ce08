//! Linux X11 screen metrics via `XDisplayWidth`/`XDisplayHeight`.
//!
//! Reports the default screen of `$DISPLAY`; there is no separate notion of
//! a virtual desktop beyond the default screen in this simplified model, so
//! `virtual_bounds` returns the same rectangle as `primary_bounds`.

#![cfg(target_os = "linux")]

use kvm_core::domain::geometry::Rect;

use super::{ScreenMetrics, ScreenMetricsError};

pub struct X11ScreenMetrics {
    display: *mut x11::xlib::Display,
}

// SAFETY: the display connection is only ever queried from the control
// core's own thread, never concurrently.
unsafe impl Send for X11ScreenMetrics {}
unsafe impl Sync for X11ScreenMetrics {}

impl X11ScreenMetrics {
    pub fn new() -> Result<Self, ScreenMetricsError> {
        // SAFETY: XOpenDisplay with a null name connects to $DISPLAY.
        let display = unsafe { x11::xlib::XOpenDisplay(std::ptr::null()) };
        if display.is_null() {
            return Err(ScreenMetricsError::Platform("XOpenDisplay returned null".into()));
        }
        Ok(Self { display })
    }
}

impl Drop for X11ScreenMetrics {
    fn drop(&mut self) {
        // SAFETY: `self.display` was opened by `XOpenDisplay` in `new`.
        unsafe { x11::xlib::XCloseDisplay(self.display) };
    }
}

impl ScreenMetrics for X11ScreenMetrics {
    fn primary_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        // SAFETY: `self.display` is a live connection; screen 0 is the
        // default screen `XOpenDisplay` selected.
        let width = unsafe { x11::xlib::XDisplayWidth(self.display, 0) };
        let height = unsafe { x11::xlib::XDisplayHeight(self.display, 0) };
        if width <= 0 || height <= 0 {
            return Err(ScreenMetricsError::Platform(
                "XDisplayWidth/XDisplayHeight returned non-positive size".into(),
            ));
        }
        Ok(Rect::new(width, height))
    }

    fn virtual_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        self.primary_bounds()
    }
}
