//! macOS screen metrics via `CGMainDisplayID`/`CGDisplayBounds`.

#![cfg(target_os = "macos")]

use core_graphics::display::{CGDisplay, CGMainDisplayID};

use kvm_core::domain::geometry::Rect;

use super::{ScreenMetrics, ScreenMetricsError};

pub struct CgScreenMetrics;

impl CgScreenMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CgScreenMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenMetrics for CgScreenMetrics {
    fn primary_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        // SAFETY: CGMainDisplayID is always safe to call.
        let display = CGDisplay::new(unsafe { CGMainDisplayID() });
        let bounds = display.bounds();
        let width = bounds.size.width as i32;
        let height = bounds.size.height as i32;
        if width <= 0 || height <= 0 {
            return Err(ScreenMetricsError::Platform(
                "CGDisplayBounds returned non-positive size".into(),
            ));
        }
        Ok(Rect::new(width, height))
    }

    fn virtual_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        self.primary_bounds()
    }
}
