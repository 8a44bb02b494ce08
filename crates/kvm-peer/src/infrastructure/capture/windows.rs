//! Windows low-level keyboard and mouse hook implementation.
//!
//! Installs `WH_KEYBOARD_LL` and `WH_MOUSE_LL` hooks on a dedicated Win32
//! message-loop thread. Both hook callbacks call straight into the
//! registered [`InputDispatch`] and use its return value to decide whether
//! to call `CallNextHookEx` — there is no deferred suppression flag, since
//! a hook cannot un-deliver an event once `CallNextHookEx` has run.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{MOUSEEVENTF_HWHEEL, MOUSEEVENTF_WHEEL};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, KBDLLHOOKSTRUCT_FLAGS, LLKHF_EXTENDED, MSG,
    MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN,
    WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_RBUTTONDOWN, WM_RBUTTONUP,
    WM_SYSKEYDOWN, WM_SYSKEYUP, WM_XBUTTONDOWN, WM_XBUTTONUP, XBUTTON1, XBUTTON2,
};

use super::{CaptureError, GlobalInputHook, InputDispatch, MouseButton, RawInputEvent};

/// Global dispatch target for the hook callbacks. Initialized once by
/// [`WindowsInputHook::start`]; there is only ever one capture service per
/// process.
static DISPATCH: OnceLock<Arc<dyn InputDispatch>> = OnceLock::new();

pub struct WindowsInputHook {
    started: AtomicBool,
}

impl WindowsInputHook {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }
}

impl Default for WindowsInputHook {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalInputHook for WindowsInputHook {
    fn start(&self, dispatch: Arc<dyn InputDispatch>) -> Result<(), CaptureError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyStarted);
        }
        DISPATCH
            .set(dispatch)
            .map_err(|_| CaptureError::KeyboardHookInstallFailed(
                "dispatch already initialized; only one capture service may run".to_string(),
            ))?;

        thread::Builder::new()
            .name("kvm-hook-loop".to_string())
            .spawn(run_hook_message_loop)
            .map_err(|e| CaptureError::KeyboardHookInstallFailed(e.to_string()))?;

        Ok(())
    }

    fn stop(&self) {
        // The message loop thread owns the hook handles and tears them down
        // on WM_QUIT; there is no cross-thread stop signal here because
        // SetWindowsHookExW hooks live and die with their install thread.
    }
}

fn run_hook_message_loop() {
    // SAFETY: SetWindowsHookExW requires the calling thread to have a message loop,
    // which the GetMessageW loop below provides.
    let kbd_hook: HHOOK = unsafe {
        SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
            .expect("WH_KEYBOARD_LL hook installation failed")
    };
    let mouse_hook: HHOOK = unsafe {
        SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0)
            .expect("WH_MOUSE_LL hook installation failed")
    };

    let mut msg = MSG::default();
    // SAFETY: standard Win32 GetMessage/DispatchMessage loop.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        UnhookWindowsHookEx(kbd_hook).ok();
        UnhookWindowsHookEx(mouse_hook).ok();
    }
}

/// Dispatches `event` and returns whether the hook proc should call
/// `CallNextHookEx` to let the event through.
fn dispatch_and_decide(event: RawInputEvent) -> bool {
    match DISPATCH.get() {
        Some(dispatch) => !dispatch.dispatch(event),
        None => true,
    }
}

/// # Safety
///
/// Called by Windows from the hook message loop thread. Must return within
/// ~300ms or the OS removes the hook.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
    let vk_code = kbs.vkCode;
    let scan_code = kbs.scanCode;
    let is_extended = (kbs.flags & LLKHF_EXTENDED) != KBDLLHOOKSTRUCT_FLAGS(0);

    let event = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => RawInputEvent::KeyDown {
            vk_code,
            scan_code,
            is_extended,
        },
        WM_KEYUP | WM_SYSKEYUP => RawInputEvent::KeyUp {
            vk_code,
            scan_code,
            is_extended,
        },
        _ => return CallNextHookEx(None, n_code, w_param, l_param),
    };

    if dispatch_and_decide(event) {
        CallNextHookEx(None, n_code, w_param, l_param)
    } else {
        LRESULT(1)
    }
}

/// # Safety
///
/// Called by Windows from the hook message loop thread; must return quickly.
unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a MSLLHOOKSTRUCT when n_code == HC_ACTION.
    let mhs = &*(l_param.0 as *const MSLLHOOKSTRUCT);
    let x = mhs.pt.x;
    let y = mhs.pt.y;

    let event = match w_param.0 as u32 {
        WM_MOUSEMOVE => RawInputEvent::MouseMove { x, y },
        WM_LBUTTONDOWN => RawInputEvent::MouseButtonDown { button: MouseButton::Left, x, y },
        WM_LBUTTONUP => RawInputEvent::MouseButtonUp { button: MouseButton::Left, x, y },
        WM_RBUTTONDOWN => RawInputEvent::MouseButtonDown { button: MouseButton::Right, x, y },
        WM_RBUTTONUP => RawInputEvent::MouseButtonUp { button: MouseButton::Right, x, y },
        WM_MBUTTONDOWN => RawInputEvent::MouseButtonDown { button: MouseButton::Middle, x, y },
        WM_MBUTTONUP => RawInputEvent::MouseButtonUp { button: MouseButton::Middle, x, y },
        WM_XBUTTONDOWN => {
            let button = if (mhs.mouseData >> 16) as u16 == XBUTTON1 {
                MouseButton::X1
            } else {
                MouseButton::X2
            };
            RawInputEvent::MouseButtonDown { button, x, y }
        }
        WM_XBUTTONUP => {
            let button = if (mhs.mouseData >> 16) as u16 == XBUTTON1 {
                MouseButton::X1
            } else {
                MouseButton::X2
            };
            RawInputEvent::MouseButtonUp { button, x, y }
        }
        msg if msg == MOUSEEVENTF_WHEEL.0 => {
            RawInputEvent::MouseWheel { delta: (mhs.mouseData >> 16) as i16 as i32, x, y }
        }
        msg if msg == MOUSEEVENTF_HWHEEL.0 => {
            RawInputEvent::MouseWheelH { delta: (mhs.mouseData >> 16) as i16 as i32, x, y }
        }
        _ => return CallNextHookEx(None, n_code, w_param, l_param),
    };

    if dispatch_and_decide(event) {
        CallNextHookEx(None, n_code, w_param, l_param)
    } else {
        LRESULT(1)
    }
}
