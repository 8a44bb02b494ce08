//! Global input capture (§4.7, §6 `GlobalInputHook`).
//!
//! On Windows this installs low-level keyboard and mouse hooks
//! (`WH_KEYBOARD_LL`, `WH_MOUSE_LL`) on a dedicated Win32 message-loop
//! thread; on Linux an X11/XTest event loop; on macOS a `CGEventTap`. All
//! three report through the same [`RawInputEvent`]/[`InputDispatch`] seam.
//!
//! # Suppression is synchronous
//!
//! A hook callback must decide whether to pass an event through to the
//! local desktop *before it returns* — there is no opportunity to suppress
//! it after the fact. [`InputDispatch::dispatch`] is therefore called
//! directly from the hook thread and must return its suppress decision
//! without blocking on I/O; the control core behind it answers from a
//! `std::sync::Mutex`-guarded state machine and hands any outbound
//! protocol message off to an unbounded channel instead of sending it
//! inline.
//!
//! # Testability
//!
//! The [`GlobalInputHook`] trait lets tests inject synthetic events through
//! [`mock::MockInputHook`] without installing real OS hooks.

use std::sync::Arc;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

/// A raw input event produced by the capture backend, in local screen
/// pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInputEvent {
    KeyDown {
        vk_code: u32,
        scan_code: u32,
        is_extended: bool,
    },
    KeyUp {
        vk_code: u32,
        scan_code: u32,
        is_extended: bool,
    },
    MouseMove {
        x: i32,
        y: i32,
    },
    MouseButtonDown {
        button: MouseButton,
        x: i32,
        y: i32,
    },
    MouseButtonUp {
        button: MouseButton,
        x: i32,
        y: i32,
    },
    MouseWheel {
        delta: i32,
        x: i32,
        y: i32,
    },
    MouseWheelH {
        delta: i32,
        x: i32,
        y: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install keyboard hook: {0}")]
    KeyboardHookInstallFailed(String),
    #[error("failed to install mouse hook: {0}")]
    MouseHookInstallFailed(String),
    #[error("capture service has already been started")]
    AlreadyStarted,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Receives every captured event synchronously and decides whether the
/// local desktop should still see it. Implemented by the control core.
pub trait InputDispatch: Send + Sync {
    /// Returns `true` if `event` must be suppressed — not delivered to the
    /// local OS — because control currently belongs to a peer.
    fn dispatch(&self, event: RawInputEvent) -> bool;
}

/// Abstraction over the OS-specific global hook installation.
pub trait GlobalInputHook: Send {
    /// Installs the hook and begins delivering events to `dispatch`
    /// synchronously from the hook thread. Returns once the hook is live.
    fn start(&self, dispatch: Arc<dyn InputDispatch>) -> Result<(), CaptureError>;
    /// Removes the hook and stops the hook thread.
    fn stop(&self);
}
