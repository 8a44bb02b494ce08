//! Clipboard access (§4.7.6, §6 `Clipboard`): reading and writing the local
//! system clipboard, and detecting local changes so they can be fanned out
//! to connected peers.
//!
//! `arboard` is cross-platform on its own, so unlike [`super::capture`] and
//! [`super::emulation`] there is a single real backend rather than one file
//! per OS; [`mock::MockClipboard`] stands in for tests.

use std::sync::{Arc, Mutex};

use kvm_core::protocol::messages::ClipboardContentType;
use thiserror::Error;

pub mod arboard_backend;
pub mod mock;

pub use arboard_backend::ArboardClipboard;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("content type {0:?} is not supported by this backend")]
    UnsupportedContentType(ClipboardContentType),
}

/// One clipboard payload: a content type tag, a format hint (e.g. a MIME
/// type for `Html`/`Image`, empty for `Text`), and the raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardContent {
    pub content_type: ClipboardContentType,
    pub format_hint: String,
    pub data: Vec<u8>,
}

/// A local-change callback registered with [`Clipboard::subscribe_change`].
pub type ChangeCallback = Arc<dyn Fn(ClipboardContent) + Send + Sync>;

/// Platform-agnostic clipboard trait; one real implementation plus
/// [`mock::MockClipboard`] for tests.
pub trait Clipboard: Send + Sync {
    fn read_content(&self) -> Result<Option<ClipboardContent>, ClipboardError>;
    fn write_content(&self, content: ClipboardContent) -> Result<(), ClipboardError>;

    /// Registers a callback fired whenever the local clipboard content
    /// changes for a reason other than [`Clipboard::write_content`] being
    /// called by this process (so fan-out of a just-applied remote update
    /// doesn't immediately bounce back out as a new local change).
    fn subscribe_change(&self, callback: ChangeCallback);
}

/// Shared last-written-by-us marker so a polling backend can distinguish a
/// clipboard change it caused from one a local user made.
#[derive(Default)]
pub(crate) struct EchoGuard {
    last_written: Mutex<Option<Vec<u8>>>,
}

impl EchoGuard {
    pub(crate) fn mark_written(&self, data: &[u8]) {
        *self.last_written.lock().expect("lock poisoned") = Some(data.to_vec());
    }

    /// Returns `true` and clears the marker if `data` matches the most
    /// recent write made through this guard.
    pub(crate) fn consume_if_matches(&self, data: &[u8]) -> bool {
        let mut guard = self.last_written.lock().expect("lock poisoned");
        if guard.as_deref() == Some(data) {
            *guard = None;
            true
        } else {
            false
        }
    }
}
