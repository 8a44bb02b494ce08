//! `arboard`-backed clipboard, polled on a background thread since neither
//! X11, Win32, nor macOS expose a single portable native-change
//! notification that `arboard` wraps; polling matches the pattern the
//! capture layer already uses for its X11 pointer backend.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use arboard::{Clipboard as ArboardHandle, ImageData};
use kvm_core::protocol::messages::ClipboardContentType;
use tracing::{debug, warn};

use super::{ChangeCallback, Clipboard, ClipboardContent, ClipboardError, EchoGuard};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct ArboardClipboard {
    handle: Arc<Mutex<ArboardHandle>>,
    echo_guard: Arc<EchoGuard>,
    callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
}

impl ArboardClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let handle = ArboardHandle::new()
            .map_err(|e| ClipboardError::Platform(format!("arboard::Clipboard::new: {e}")))?;
        Ok(Self {
            handle: Arc::new(Mutex::new(handle)),
            echo_guard: Arc::new(EchoGuard::default()),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn read_locked(handle: &mut ArboardHandle) -> Result<Option<ClipboardContent>, ClipboardError> {
        if let Ok(text) = handle.get_text() {
            if !text.is_empty() {
                return Ok(Some(ClipboardContent {
                    content_type: ClipboardContentType::Text,
                    format_hint: String::new(),
                    data: text.into_bytes(),
                }));
            }
        }
        if let Ok(image) = handle.get_image() {
            return Ok(Some(ClipboardContent {
                content_type: ClipboardContentType::Image,
                format_hint: format!("{}x{}", image.width, image.height),
                data: image.bytes.into_owned(),
            }));
        }
        Ok(None)
    }
}

impl Clipboard for ArboardClipboard {
    fn read_content(&self) -> Result<Option<ClipboardContent>, ClipboardError> {
        let mut handle = self.handle.lock().expect("lock poisoned");
        Self::read_locked(&mut handle)
    }

    fn write_content(&self, content: ClipboardContent) -> Result<(), ClipboardError> {
        let mut handle = self.handle.lock().expect("lock poisoned");
        match content.content_type {
            ClipboardContentType::Text => {
                let text = String::from_utf8_lossy(&content.data).into_owned();
                self.echo_guard.mark_written(text.as_bytes());
                handle
                    .set_text(text)
                    .map_err(|e| ClipboardError::Platform(format!("set_text: {e}")))
            }
            ClipboardContentType::Image => {
                let (width, height) = parse_dimensions(&content.format_hint)?;
                self.echo_guard.mark_written(&content.data);
                let image = ImageData {
                    width,
                    height,
                    bytes: content.data.into(),
                };
                handle
                    .set_image(image)
                    .map_err(|e| ClipboardError::Platform(format!("set_image: {e}")))
            }
            other => Err(ClipboardError::UnsupportedContentType(other)),
        }
    }

    fn subscribe_change(&self, callback: ChangeCallback) {
        self.callbacks.lock().expect("lock poisoned").push(callback);

        if self.callbacks.lock().expect("lock poisoned").len() > 1 {
            // A polling thread is already running for this instance.
            return;
        }

        let handle = Arc::clone(&self.handle);
        let echo_guard = Arc::clone(&self.echo_guard);
        let callbacks = Arc::clone(&self.callbacks);
        let mut last_seen: Option<u64> = None;

        thread::spawn(move || loop {
            thread::sleep(POLL_INTERVAL);
            let content = {
                let mut h = handle.lock().expect("lock poisoned");
                match Self::read_locked(&mut h) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("clipboard poll failed: {e}");
                        continue;
                    }
                }
            };
            let Some(content) = content else { continue };

            if echo_guard.consume_if_matches(&content.data) {
                last_seen = Some(hash_of(&content));
                continue;
            }

            let digest = hash_of(&content);
            if last_seen == Some(digest) {
                continue;
            }
            last_seen = Some(digest);

            debug!("local clipboard change detected, notifying subscribers");
            for cb in callbacks.lock().expect("lock poisoned").iter() {
                cb(content.clone());
            }
        });
    }
}

fn parse_dimensions(format_hint: &str) -> Result<(usize, usize), ClipboardError> {
    let (w, h) = format_hint
        .split_once('x')
        .ok_or_else(|| ClipboardError::Platform(format!("invalid image format_hint: {format_hint}")))?;
    let width: usize = w
        .parse()
        .map_err(|_| ClipboardError::Platform(format!("invalid image width: {w}")))?;
    let height: usize = h
        .parse()
        .map_err(|_| ClipboardError::Platform(format!("invalid image height: {h}")))?;
    Ok((width, height))
}

fn hash_of(content: &ClipboardContent) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.data.hash(&mut hasher);
    hasher.finish()
}
