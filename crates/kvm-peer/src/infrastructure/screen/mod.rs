//! Screen geometry (§4.5, §6 `ScreenMetrics`): how a peer learns the size of
//! its own primary display so the control core can clamp incoming pointer
//! coordinates and compute edge-entry positions.
//!
//! Unlike the teacher's multi-monitor `screen_info` module, this system
//! models each host as a single rectangle (`kvm_core::domain::geometry::Rect`)
//! with no virtual-desktop enumeration.

use kvm_core::domain::geometry::Rect;
use thiserror::Error;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;
#[cfg(target_os = "windows")]
pub use windows::WindowsScreenMetrics as NativeScreenMetrics;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "linux")]
pub use linux::X11ScreenMetrics as NativeScreenMetrics;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
pub use macos::CgScreenMetrics as NativeScreenMetrics;

#[derive(Debug, Error)]
pub enum ScreenMetricsError {
    #[error("platform error: {0}")]
    Platform(String),
}

/// Platform-agnostic screen size query; one implementation per OS plus
/// [`mock::MockScreenMetrics`] for tests.
///
/// `virtual_bounds` coincides with `primary_bounds` on every backend here
/// since there is no virtual-desktop model, but the two are kept distinct
/// in the trait so a future multi-monitor backend has somewhere to report
/// the union of all displays without changing callers.
pub trait ScreenMetrics: Send + Sync {
    fn primary_bounds(&self) -> Result<Rect, ScreenMetricsError>;
    fn virtual_bounds(&self) -> Result<Rect, ScreenMetricsError>;
}
