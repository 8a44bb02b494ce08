//! Windows screen metrics via `GetSystemMetrics`.
//!
//! `primary_bounds` reports the primary monitor (`SM_CXSCREEN`/`SM_CYSCREEN`);
//! `virtual_bounds` reports the bounding box of the whole virtual desktop
//! (`SM_CXVIRTUALSCREEN`/`SM_CYVIRTUALSCREEN`), matching the normalization
//! range the emulation backend already uses for absolute mouse moves.

#![cfg(target_os = "windows")]

use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXSCREEN, SM_CXVIRTUALSCREEN, SM_CYSCREEN, SM_CYVIRTUALSCREEN,
};

use kvm_core::domain::geometry::Rect;

use super::{ScreenMetrics, ScreenMetricsError};

pub struct WindowsScreenMetrics;

impl WindowsScreenMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsScreenMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenMetrics for WindowsScreenMetrics {
    fn primary_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        // SAFETY: GetSystemMetrics is always safe to call.
        let width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if width <= 0 || height <= 0 {
            return Err(ScreenMetricsError::Platform(
                "GetSystemMetrics(SM_CXSCREEN/SM_CYSCREEN) returned non-positive size".into(),
            ));
        }
        Ok(Rect::new(width, height))
    }

    fn virtual_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        // SAFETY: GetSystemMetrics is always safe to call.
        let width = unsafe { GetSystemMetrics(SM_CXVIRTUALSCREEN) };
        let height = unsafe { GetSystemMetrics(SM_CYVIRTUALSCREEN) };
        if width <= 0 || height <= 0 {
            return Err(ScreenMetricsError::Platform(
                "GetSystemMetrics(SM_CXVIRTUALSCREEN/SM_CYVIRTUALSCREEN) returned non-positive size".into(),
            ));
        }
        Ok(Rect::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_bounds_returns_a_positive_rect() {
        let metrics = WindowsScreenMetrics::new();
        let result = metrics.primary_bounds();
        assert!(result.is_ok());
        let bounds = result.unwrap();
        assert!(bounds.width > 0 && bounds.height > 0);
    }
}
