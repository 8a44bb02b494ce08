//! Key code translation tables for cross-platform keyboard event mapping.
//!
//! The canonical representation is USB HID Usage IDs (page 0x07, Keyboard/Keypad).
//! Platform-specific codes are translated to/from HID at capture/emulation boundaries.

pub mod hid;
pub mod linux_x11;
pub mod macos_cg;
pub mod windows_vk;

pub use hid::HidKeyCode;

/// Unified key mapper providing all translation directions.
pub struct KeyMapper;

impl KeyMapper {
    /// Translates a Windows Virtual Key code to a [`HidKeyCode`].
    ///
    /// Returns [`HidKeyCode::Unknown`] if no mapping exists for `vk`.
    pub fn windows_vk_to_hid(vk: u8) -> HidKeyCode {
        windows_vk::vk_to_hid(vk)
    }

    /// Translates a [`HidKeyCode`] to a Windows Virtual Key code.
    ///
    /// Returns `None` if the HID code has no Windows VK equivalent.
    pub fn hid_to_windows_vk(hid: HidKeyCode) -> Option<u8> {
        windows_vk::hid_to_vk(hid)
    }

    /// Translates a [`HidKeyCode`] to an X11 KeySym value for Linux clients.
    ///
    /// Returns `None` if the HID code has no X11 equivalent.
    pub fn hid_to_x11_keysym(hid: HidKeyCode) -> Option<u32> {
        linux_x11::hid_to_keysym(hid)
    }

    /// Translates a [`HidKeyCode`] to a macOS `CGKeyCode` value.
    ///
    /// Returns `None` if the HID code has no macOS equivalent.
    pub fn hid_to_macos_cgkeycode(hid: HidKeyCode) -> Option<u16> {
        macos_cg::hid_to_cgkeycode(hid)
    }
}
