//! Windows input synthesis via the `SendInput` API.
//!
//! Mouse coordinates are normalized to Windows' virtual-screen range
//! `[0, 65535]`; keyboard events are injected by scan code with
//! `KEYEVENTF_SCANCODE` so the OS layout (not ours) maps it to a character.

#![cfg(target_os = "windows")]

use kvm_core::protocol::messages::{KeyEventType, KeyboardMessage, MouseEventType, MouseMessage};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL,
    MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, MOUSEINPUT, SendInput, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, ShowCursor, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, XBUTTON1, XBUTTON2,
};

use super::{EmulationError, InputSynthesis};

pub struct WindowsSynthesizer;

impl WindowsSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSynthesis for WindowsSynthesizer {
    fn apply_mouse(&self, event: &MouseMessage) -> Result<(), EmulationError> {
        match event.event_type {
            MouseEventType::Move => send_absolute_move(event.x, event.y),
            MouseEventType::Wheel => send_wheel(event.wheel_delta, false),
            MouseEventType::HWheel => send_wheel(event.wheel_delta, true),
            other => send_button(other),
        }
    }

    fn apply_keyboard(&self, event: &KeyboardMessage) -> Result<(), EmulationError> {
        let vk = event.key_code as u16;
        let mut flags = KEYEVENTF_SCANCODE;
        if event.event_type == KeyEventType::Up {
            flags |= KEYEVENTF_KEYUP;
        }
        if event.is_extended {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }

        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: event.scan_code as u16,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        // SAFETY: `input` is a valid, fully-initialized INPUT on the stack.
        unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        Ok(())
    }

    fn hide_cursor(&self) -> Result<(), EmulationError> {
        // SAFETY: ShowCursor is always safe to call; it adjusts a per-thread
        // display counter rather than taking a pointer.
        while unsafe { ShowCursor(false) } >= 0 {}
        Ok(())
    }

    fn show_cursor(&self) -> Result<(), EmulationError> {
        // SAFETY: see above.
        while unsafe { ShowCursor(true) } < 0 {}
        Ok(())
    }
}

fn send_absolute_move(x: i32, y: i32) -> Result<(), EmulationError> {
    let (norm_x, norm_y) = normalize_coords(x, y);
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: norm_x,
                dy: norm_y,
                mouseData: 0,
                dwFlags: MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    // SAFETY: `input` is a valid MOUSEINPUT using absolute, normalized coords.
    unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    Ok(())
}

fn send_button(event_type: MouseEventType) -> Result<(), EmulationError> {
    let (flags, mouse_data) = match event_type {
        MouseEventType::LeftDown => (MOUSEEVENTF_LEFTDOWN, 0),
        MouseEventType::LeftUp => (MOUSEEVENTF_LEFTUP, 0),
        MouseEventType::RightDown => (MOUSEEVENTF_RIGHTDOWN, 0),
        MouseEventType::RightUp => (MOUSEEVENTF_RIGHTUP, 0),
        MouseEventType::MiddleDown => (MOUSEEVENTF_MIDDLEDOWN, 0),
        MouseEventType::MiddleUp => (MOUSEEVENTF_MIDDLEUP, 0),
        MouseEventType::XButton1Down => (MOUSEEVENTF_XDOWN, XBUTTON1 as u32),
        MouseEventType::XButton1Up => (MOUSEEVENTF_XUP, XBUTTON1 as u32),
        MouseEventType::XButton2Down => (MOUSEEVENTF_XDOWN, XBUTTON2 as u32),
        MouseEventType::XButton2Up => (MOUSEEVENTF_XUP, XBUTTON2 as u32),
        MouseEventType::Move | MouseEventType::Wheel | MouseEventType::HWheel => {
            return Err(EmulationError::Platform(format!(
                "{event_type:?} is not a button event"
            )))
        }
    };

    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: mouse_data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    // SAFETY: `input` is a valid MOUSEINPUT button event.
    unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    Ok(())
}

fn send_wheel(delta: i32, horizontal: bool) -> Result<(), EmulationError> {
    let flags = if horizontal { MOUSEEVENTF_HWHEEL } else { MOUSEEVENTF_WHEEL };
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: delta as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    // SAFETY: `input` is a valid MOUSEINPUT wheel event.
    unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    Ok(())
}

/// Normalizes pixel coordinates to Windows' `[0, 65535]` virtual-screen range.
fn normalize_coords(x: i32, y: i32) -> (i32, i32) {
    // SAFETY: GetSystemMetrics is always safe to call.
    let screen_w = unsafe { GetSystemMetrics(SM_CXVIRTUALSCREEN) };
    let screen_h = unsafe { GetSystemMetrics(SM_CYVIRTUALSCREEN) };

    let norm_x = if screen_w > 0 { (x * 65535 / screen_w).clamp(0, 65535) } else { 0 };
    let norm_y = if screen_h > 0 { (y * 65535 / screen_h).clamp(0, 65535) } else { 0 };
    (norm_x, norm_y)
}

#[cfg(test)]
mod tests {
    #[test]
    fn normalize_coords_clamps_to_valid_range() {
        let result_x = (500i32 * 65535 / 1920).clamp(0, 65535);
        let result_y = (300i32 * 65535 / 1080).clamp(0, 65535);
        assert!((0..=65535).contains(&result_x));
        assert!((0..=65535).contains(&result_y));
    }

    #[test]
    fn normalize_coords_full_width_gives_max() {
        let result_x = (1920i32 * 65535 / 1920).clamp(0, 65535);
        assert_eq!(result_x, 65535);
    }
}
