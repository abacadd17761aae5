/*
 *  registry/ffi.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  C ABI types for the producer plugin interface
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

//! FFI types for the PixMux producer plugin system
//!
//! This module defines C-compatible types that form the stable ABI
//! between the host and producer plugins. All types use `#[repr(C)]` to
//! ensure consistent memory layout across compilation units. Frames cross
//! the boundary as packed 1-bpp buffers (8 pixels per byte, LSB first),
//! the same wire format `Frame::to_packed_bytes` produces.

use std::ffi::c_char;

use crate::error::ProducerError;

/// Plugin ABI version
pub const PIXMUX_PLUGIN_ABI_VERSION_MAJOR: u32 = 1;
pub const PIXMUX_PLUGIN_ABI_VERSION_MINOR: u32 = 0;
pub const PIXMUX_PLUGIN_ABI_VERSION_PATCH: u32 = 0;

/// Maximum length for error messages
pub const PIXMUX_ERROR_MESSAGE_SIZE: usize = 256;

/// Maximum length for plugin metadata strings
pub const PIXMUX_PLUGIN_NAME_SIZE: usize = 64;
pub const PIXMUX_PLUGIN_VERSION_SIZE: usize = 32;

/// Maximum length of the comma-separated live-modes list
pub const PIXMUX_LIVE_MODES_SIZE: usize = 256;

/// Opaque handle to a plugin producer instance
#[repr(C)]
pub struct PixmuxProducerHandle {
    _private: [u8; 0],
}

/// Error codes returned by plugin functions
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixmuxErrorCode {
    /// Operation completed successfully
    Success = 0,

    /// Generic error
    ErrorGeneric = 1,

    /// Invalid argument passed to function
    ErrorInvalidArgument = 2,

    /// Data refresh failed
    ErrorUpdate = 3,

    /// Frame composition failed
    ErrorRender = 4,

    /// Null pointer passed where non-null expected
    ErrorNullPointer = 5,

    /// Panic occurred in plugin code
    ErrorPanic = 6,

    /// ABI version mismatch
    ErrorAbiMismatch = 7,
}

/// Error information structure
#[repr(C)]
pub struct PixmuxError {
    /// Error code
    pub code: PixmuxErrorCode,

    /// Human-readable error message (null-terminated)
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

    /// Extract error message as Rust string
    pub fn message_str(&self) -> String {
        extract_string(&self.message)
    }
}

impl Default for PixmuxError {
    fn default() -> Self {
        Self::success()
    }
}

impl From<PixmuxError> for ProducerError {
    fn from(error: PixmuxError) -> Self {
        let message = error.message_str();

        match error.code {
            PixmuxErrorCode::ErrorUpdate => ProducerError::Update(message),
            PixmuxErrorCode::ErrorRender => ProducerError::Render(message),
            PixmuxErrorCode::ErrorPanic => ProducerError::Panic(message),
            _ => ProducerError::Other(message),
        }
    }
}

/// Extract a null-terminated string from a C char buffer
pub fn extract_string(buffer: &[c_char]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());

    let bytes: Vec<u8> = buffer[..len].iter().map(|&c| c as u8).collect();

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Plugin vtable - function pointers for all producer operations
///
/// `create` receives the producer id, its config blob serialized as YAML,
/// and the frame geometry. `render` composes into a host-owned packed
/// buffer; the host pushes the result to the display sink.
#[repr(C)]
pub struct PixmuxProducerVTable {
    /// Get plugin ABI version (major, minor, patch)
    pub abi_version: extern "C" fn(major: *mut u32, minor: *mut u32, patch: *mut u32),

    /// Get plugin metadata (name, version)
    pub plugin_info: extern "C" fn(name: *mut c_char, version: *mut c_char),

    /// Create a new producer instance
    pub create: extern "C" fn(
        id: *const c_char,
        config_yaml: *const c_char,
        width: u32,
        height: u32,
        handle: *mut *mut PixmuxProducerHandle,
        error: *mut PixmuxError,
    ) -> PixmuxErrorCode,

    /// Destroy a producer instance
    pub destroy: extern "C" fn(handle: *mut PixmuxProducerHandle),

    /// Producer-side config validation; false aborts the load
    pub validate_config: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    /// Refresh the producer's data
    pub update: extern "C" fn(
        handle: *mut PixmuxProducerHandle,
        error: *mut PixmuxError,
    ) -> PixmuxErrorCode,

    /// Compose a frame for `mode` into the packed 1-bpp buffer
    pub render: extern "C" fn(
        handle: *mut PixmuxProducerHandle,
        mode: *const c_char,
        force_clear: bool,
        buffer: *mut u8,
        buffer_len: usize,
        error: *mut PixmuxError,
    ) -> PixmuxErrorCode,

    /// Display duration in milliseconds; re-queried every tick
    pub display_duration_ms: extern "C" fn(handle: *const PixmuxProducerHandle) -> u64,

    /// Whether this producer may preempt rotation
    pub has_live_priority: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    /// Whether time-critical content is available right now
    pub has_live_content: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    /// Comma-separated live mode list written into `out`; returns bytes
    /// written (excluding the null terminator)
    pub live_modes: extern "C" fn(
        handle: *const PixmuxProducerHandle,
        out: *mut c_char,
        capacity: usize,
    ) -> usize,

    /// True while a scroll/wipe animation is in flight
    pub is_animating: extern "C" fn(handle: *const PixmuxProducerHandle) -> bool,

    pub on_enable: extern "C" fn(handle: *mut PixmuxProducerHandle),

    pub on_disable: extern "C" fn(handle: *mut PixmuxProducerHandle),

    /// Pushed config update (YAML blob)
    pub on_config_change:
        extern "C" fn(handle: *mut PixmuxProducerHandle, config_yaml: *const c_char),

    /// Release resources ahead of destroy
    pub cleanup: extern "C" fn(handle: *mut PixmuxProducerHandle),
}

/// Plugin registration function type
///
/// Each plugin exports a function with this signature under the symbol
/// named by its manifest's `class_name`:
/// ```c
/// #[no_mangle]
/// pub extern "C" fn pixmux_producer_register() -> *const PixmuxProducerVTable
/// ```
pub type ProducerRegisterFn = extern "C" fn() -> *const PixmuxProducerVTable;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_round_trip() {
        let error = PixmuxError::new(PixmuxErrorCode::ErrorUpdate, "fetch timed out");
        assert_eq!(error.message_str(), "fetch timed out");

        let producer_error: ProducerError = error.into();
        assert!(matches!(producer_error, ProducerError::Update(_)));
    }

    #[test]
    fn test_error_message_truncated_not_overrun() {
        let long = "x".repeat(PIXMUX_ERROR_MESSAGE_SIZE * 2);
        let error = PixmuxError::new(PixmuxErrorCode::ErrorGeneric, &long);
        assert_eq!(error.message_str().len(), PIXMUX_ERROR_MESSAGE_SIZE - 1);
    }
}
