//! Mock clipboard for unit testing clipboard fan-out without touching the
//! real OS clipboard.

use std::sync::Mutex;

use super::{ChangeCallback, Clipboard, ClipboardContent, ClipboardError};

#[derive(Default)]
pub struct MockClipboard {
    pub content: Mutex<Option<ClipboardContent>>,
    pub written: Mutex<Vec<ClipboardContent>>,
    callbacks: Mutex<Vec<ChangeCallback>>,
}

impl MockClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a local clipboard change made outside this process,
    /// invoking every registered subscriber.
    pub fn simulate_local_change(&self, content: ClipboardContent) {
        *self.content.lock().expect("lock poisoned") = Some(content.clone());
        for cb in self.callbacks.lock().expect("lock poisoned").iter() {
            cb(content.clone());
        }
    }
}

impl Clipboard for MockClipboard {
    fn read_content(&self) -> Result<Option<ClipboardContent>, ClipboardError> {
        Ok(self.content.lock().expect("lock poisoned").clone())
    }

    fn write_content(&self, content: ClipboardContent) -> Result<(), ClipboardError> {
        *self.content.lock().expect("lock poisoned") = Some(content.clone());
        self.written.lock().expect("lock poisoned").push(content);
        Ok(())
    }

    fn subscribe_change(&self, callback: ChangeCallback) {
        self.callbacks.lock().expect("lock poisoned").push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvm_core::protocol::messages::ClipboardContentType;
    use std::sync::{Arc, Mutex as StdMutex};

    fn text_content(s: &str) -> ClipboardContent {
        ClipboardContent {
            content_type: ClipboardContentType::Text,
            format_hint: String::new(),
            data: s.as_bytes().to_vec(),
        }
    }

    #[test]
    fn write_content_is_readable_back() {
        let clip = MockClipboard::new();
        clip.write_content(text_content("hello")).unwrap();
        assert_eq!(clip.read_content().unwrap(), Some(text_content("hello")));
    }

    #[test]
    fn simulate_local_change_notifies_subscribers() {
        let clip = MockClipboard::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        clip.subscribe_change(Arc::new(move |c| received_clone.lock().unwrap().push(c)));

        clip.simulate_local_change(text_content("from peer"));

        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(received.lock().unwrap()[0], text_content("from peer"));
    }
}
