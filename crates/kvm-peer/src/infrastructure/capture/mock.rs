//! Mock global input hook for unit testing.
//!
//! Lets tests inject synthetic [`RawInputEvent`]s and observe the
//! suppression decision the registered [`InputDispatch`] returns, without
//! installing real OS hooks.

use std::sync::{Arc, Mutex};

use super::{CaptureError, GlobalInputHook, InputDispatch, RawInputEvent};

#[derive(Default)]
pub struct MockInputHook {
    dispatch: Mutex<Option<Arc<dyn InputDispatch>>>,
    suppressed_count: Mutex<u32>,
}

impl MockInputHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects `event` as if captured from hardware, returning the
    /// dispatch's suppress decision.
    ///
    /// Panics if `start()` has not been called.
    pub fn inject_event(&self, event: RawInputEvent) -> bool {
        let guard = self.dispatch.lock().expect("lock poisoned");
        let dispatch = guard
            .as_ref()
            .expect("MockInputHook::inject_event called before start()");
        let suppressed = dispatch.dispatch(event);
        if suppressed {
            *self.suppressed_count.lock().expect("lock poisoned") += 1;
        }
        suppressed
    }

    pub fn suppressed_count(&self) -> u32 {
        *self.suppressed_count.lock().expect("lock poisoned")
    }
}

impl GlobalInputHook for MockInputHook {
    fn start(&self, dispatch: Arc<dyn InputDispatch>) -> Result<(), CaptureError> {
        *self.dispatch.lock().expect("lock poisoned") = Some(dispatch);
        Ok(())
    }

    fn stop(&self) {
        *self.dispatch.lock().expect("lock poisoned") = None;
    }
}
