/*
 *  PixMux Marquee Plugin - FFI Types
 *
 *  C ABI types matching the PixMux producer plugin interface.
 *  These types must match exactly with the host's FFI types.
 */

use std::ffi::c_char;

/// Plugin ABI version
pub const PIXMUX_PLUGIN_ABI_VERSION_MAJOR: u32 = 1;
pub const PIXMUX_PLUGIN_ABI_VERSION_MINOR: u32 = 0;
pub const PIXMUX_PLUGIN_ABI_VERSION_PATCH: u32 = 0;

/// Maximum length for error messages
pub const PIXMUX_ERROR_MESSAGE_SIZE: usize = 256;

/// Opaque handle to a plugin producer instance
#[repr(C)]
pub struct PixmuxProducerHandle {
    _private: [u8; 0],
}

/// Error codes returned by plugin functions
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixmuxErrorCode {
    Success = 0,
    ErrorGeneric = 1,
    ErrorInvalidArgument = 2,
    ErrorUpdate = 3,
    ErrorRender = 4,
    ErrorNullPointer = 5,
    ErrorPanic = 6,
    ErrorAbiMismatch = 7,
}

/// Error information structure
#[repr(C)]
pub struct PixmuxError {
    pub code: PixmuxErrorCode,
    pub message: [c_char; PIXMUX_ERROR_MESSAGE_SIZE],
}

impl PixmuxError {
    /// Create a new error with code and message
    pub fn new(code: PixmuxErrorCode, message: &str) -> Self {
        let mut error = Self {
            code,
            message: [0; PIXMUX_ERROR_MESSAGE_SIZE],
        };

        let bytes = message.as_bytes();
        let len = bytes.len().min(PIXMUX_ERROR_MESSAGE_SIZE - 1);

        for (i, &byte) in bytes.iter().take(len).enumerate() {
            error.message[i] = byte as c_char;
        }

        error
    }

    /// Create a success error (no error)
    pub fn success() -> Self {
        Self::new(PixmuxErrorCode::Success, "")
    }
}

impl Default for PixmuxError {
    fn default() -> Self {
        Self::success()
    }
}

/// Producer vtable - must match the host's layout field for field
#[repr(C)]
pub struct PixmuxProducerVTable {
    pub abi_version: extern "C" fn(major: *mut u32, minor: *mut u32, patch: *mut u32),

    pub plugin_info: extern "C" fn(name: *mut c_char, version: *mut c_char),

    pub create: extern "C" fn(
        id: *const c_char,
        config_yaml: *const c_char,
        width: u32,
        height: u32,
        handle: *mut *mut PixmuxProducerHandle,
        error: *mut PixmuxError,
    ) -> PixmuxErrorCode,

    pub destroy: extern "C" fn(handle: *mut PixmuxProducerHandle),

    pub validate_config: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    pub update: extern "C" fn(
        handle: *mut PixmuxProducerHandle,
        error: *mut PixmuxError,
    ) -> PixmuxErrorCode,

    pub render: extern "C" fn(
        handle: *mut PixmuxProducerHandle,
        mode: *const c_char,
        force_clear: bool,
        buffer: *mut u8,
        buffer_len: usize,
        error: *mut PixmuxError,
    ) -> PixmuxErrorCode,

    pub display_duration_ms: extern "C" fn(handle: *const PixmuxProducerHandle) -> u64,

    pub has_live_priority: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    pub has_live_content: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    pub live_modes: extern "C" fn(
        handle: *const PixmuxProducerHandle,
        out: *mut c_char,
        capacity: usize,
    ) -> usize,

    pub is_animating: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    pub on_enable: extern "C" fn(handle: *mut PixmuxProducerHandle),

    pub on_disable: extern "C" fn(handle: *mut PixmuxProducerHandle),

    pub on_config_change:
        extern "C" fn(handle: *mut PixmuxProducerHandle, config_yaml: *const c_char),

    pub cleanup: extern "C" fn(handle: *mut PixmuxProducerHandle),
}

/// Copy a Rust string into a fixed-size C buffer (null-terminated)
pub fn copy_str_to_buffer(s: &str, buffer: *mut c_char, max_len: usize) {
    if buffer.is_null() || max_len == 0 {
        return;
    }

    let bytes = s.as_bytes();
    let len = bytes.len().min(max_len - 1);

    unsafe {
        for (i, &byte) in bytes.iter().take(len).enumerate() {
            *buffer.add(i) = byte as c_char;
        }
        *buffer.add(len) = 0;
    }
}

/// Read a null-terminated C string into an owned Rust string
pub unsafe fn string_from_ptr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned() }
}
