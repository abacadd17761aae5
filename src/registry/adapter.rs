/*
 *  registry/adapter.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Plugin adapter - wraps C ABI producer plugins as Rust trait objects
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

use std::ffi::CString;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use log::{debug, error, warn};

use super::ffi::{
    extract_string, PixmuxError, PixmuxErrorCode, PixmuxProducerHandle,
    PIXMUX_LIVE_MODES_SIZE,
};
use super::loader::LoadedPlugin;
use crate::error::ProducerError;
use crate::frame::Frame;
use crate::producer::Producer;
use crate::sink::SharedSink;

/// Adapter that wraps a plugin producer as a `Producer` trait object.
///
/// Bridges the C ABI to the trait: FFI error conversion, panic fencing
/// around every vtable call, and RAII destruction of the plugin handle.
/// The plugin composes into a packed 1-bpp buffer; the adapter unpacks it
/// into a `Frame` and pushes it through the shared sink, so plugins never
/// touch the sink directly.
pub struct PluginProducer {
    /// The loaded plugin (kept alive for vtable access)
    plugin: LoadedPlugin,

    /// Opaque handle to the plugin producer instance
    handle: *mut PixmuxProducerHandle,

    id: String,

    /// Frame reused across renders; sized once from the sink geometry
    frame: Frame,

    sink: SharedSink,
}

// SAFETY: the handle is only ever dereferenced by the plugin itself via
// vtable calls, and the registry serializes all access from one thread.
unsafe impl Send for PluginProducer {}

impl PluginProducer {
    /// Instantiate a producer through the plugin's vtable.
    ///
    /// The config blob travels as serialized YAML; geometry travels as
    /// plain dimensions so the plugin can size its own compositor.
    pub fn new(
        plugin: LoadedPlugin,
        id: &str,
        config: &serde_yaml::Value,
        sink: SharedSink,
    ) -> Result<Self, ProducerError> {
        let vtable = plugin.vtable();

        let config_yaml = serde_yaml::to_string(config)
            .map_err(|e| ProducerError::Other(format!("config serialization: {}", e)))?;

        let c_id = CString::new(id.to_string())
            .map_err(|_| ProducerError::Other("producer id contains NUL".to_string()))?;
        let c_config = CString::new(config_yaml)
            .map_err(|_| ProducerError::Other("config blob contains NUL".to_string()))?;

        let (width, height) = {
            let guard = sink
                .lock()
                .map_err(|_| ProducerError::Other("sink mutex poisoned".to_string()))?;
            guard.dimensions()
        };

        let mut handle: *mut PixmuxProducerHandle = std::ptr::null_mut();
        let mut error = PixmuxError::default();

        let (result, panic_error) = catch_ffi_call(|| {
            (vtable.create)(
                c_id.as_ptr(),
                c_config.as_ptr(),
                width,
                height,
                &mut handle,
                &mut error,
            )
        });

        if let Some(e) = panic_error {
            return Err(e.into());
        }

        if result != PixmuxErrorCode::Success || handle.is_null() {
            return Err(error.into());
        }

        debug!("Created plugin producer instance '{}': {:p}", id, handle);

        Ok(Self {
            plugin,
            handle,
            id: id.to_string(),
            frame: Frame::new(width, height),
            sink,
        })
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin.metadata().name
    }

    pub fn plugin_version(&self) -> &str {
        &self.plugin.metadata().version
    }
}

impl Producer for PluginProducer {
    fn id(&self) -> &str {
        &self.id
    }

    fn update(&mut self) -> Result<(), ProducerError> {
        let vtable = self.plugin.vtable();
        let mut error = PixmuxError::default();

        let (result, panic_error) =
            catch_ffi_call(|| (vtable.update)(self.handle, &mut error));

        if let Some(e) = panic_error {
            return Err(e.into());
        }

        if result != PixmuxErrorCode::Success {
            return Err(error.into());
        }

        Ok(())
    }

    fn display(&mut self, mode: &str, force_clear: bool) -> Result<(), ProducerError> {
        let vtable = self.plugin.vtable();
        let mut error = PixmuxError::default();

        let c_mode = CString::new(mode.to_string())
            .map_err(|_| ProducerError::Render("mode name contains NUL".to_string()))?;

        let pixels = self.frame.width() as usize * self.frame.height() as usize;
        let mut buffer = vec![0u8; (pixels + 7) / 8];

        let (result, panic_error) = catch_ffi_call(|| {
            (vtable.render)(
                self.handle,
                c_mode.as_ptr(),
                force_clear,
                buffer.as_mut_ptr(),
                buffer.len(),
                &mut error,
            )
        });

        if let Some(e) = panic_error {
            return Err(e.into());
        }

        if result != PixmuxErrorCode::Success {
            return Err(error.into());
        }

        self.frame.load_packed_bytes(&buffer);

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| ProducerError::Render("sink mutex poisoned".to_string()))?;
        sink.push_frame(&self.frame)
    }

    fn display_duration(&self) -> Duration {
        let vtable = self.plugin.vtable();
        let ms = match panic::catch_unwind(AssertUnwindSafe(|| {
            (vtable.display_duration_ms)(self.handle)
        })) {
            Ok(ms) => ms,
            Err(_) => {
                error!("Plugin '{}' panicked in display_duration", self.id);
                10_000
            }
        };
        Duration::from_millis(ms)
    }

    fn has_live_priority(&self) -> bool {
        let vtable = self.plugin.vtable();
        panic::catch_unwind(AssertUnwindSafe(|| {
            (vtable.has_live_priority)(self.handle)
        }))
        .unwrap_or(false)
    }

    fn has_live_content(&self) -> bool {
        let vtable = self.plugin.vtable();
        panic::catch_unwind(AssertUnwindSafe(|| {
            (vtable.has_live_content)(self.handle)
        }))
        .unwrap_or(false)
    }

    fn live_modes(&self) -> Vec<String> {
        let vtable = self.plugin.vtable();
        let mut buf = vec![0 as std::ffi::c_char; PIXMUX_LIVE_MODES_SIZE];

        let written = match panic::catch_unwind(AssertUnwindSafe(|| {
            (vtable.live_modes)(self.handle, buf.as_mut_ptr(), buf.len())
        })) {
            Ok(n) => n,
            Err(_) => {
                error!("Plugin '{}' panicked in live_modes", self.id);
                return Vec::new();
            }
        };

        if written == 0 {
            return Vec::new();
        }

        extract_string(&buf)
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn is_animating(&self) -> bool {
        let vtable = self.plugin.vtable();
        panic::catch_unwind(AssertUnwindSafe(|| (vtable.is_animating)(self.handle)))
            .unwrap_or(false)
    }

    fn validate_config(&self) -> bool {
        let vtable = self.plugin.vtable();
        panic::catch_unwind(AssertUnwindSafe(|| {
            (vtable.validate_config)(self.handle)
        }))
        .unwrap_or(false)
    }

    fn cleanup(&mut self) {
        let vtable = self.plugin.vtable();
        if panic::catch_unwind(AssertUnwindSafe(|| (vtable.cleanup)(self.handle))).is_err() {
            warn!("Plugin '{}' panicked in cleanup", self.id);
        }
    }

    fn on_enable(&mut self) {
        let vtable = self.plugin.vtable();
        if panic::catch_unwind(AssertUnwindSafe(|| (vtable.on_enable)(self.handle))).is_err() {
            warn!("Plugin '{}' panicked in on_enable", self.id);
        }
    }

    fn on_disable(&mut self) {
        let vtable = self.plugin.vtable();
        if panic::catch_unwind(AssertUnwindSafe(|| (vtable.on_disable)(self.handle))).is_err() {
            warn!("Plugin '{}' panicked in on_disable", self.id);
        }
    }

    fn on_config_change(&mut self, new_config: &serde_yaml::Value) {
        let vtable = self.plugin.vtable();
        let yaml = match serde_yaml::to_string(new_config) {
            Ok(y) => y,
            Err(e) => {
                warn!("Config change for '{}' not serializable: {}", self.id, e);
                return;
            }
        };
        let c_config = match CString::new(yaml) {
            Ok(c) => c,
            Err(_) => {
                warn!("Config change for '{}' contains NUL", self.id);
                return;
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(|| {
            (vtable.on_config_change)(self.handle, c_config.as_ptr())
        }))
        .is_err()
        {
            warn!("Plugin '{}' panicked in on_config_change", self.id);
        }
    }
}

impl Drop for PluginProducer {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            debug!("Destroying plugin producer instance '{}': {:p}", self.id, self.handle);

            let vtable = self.plugin.vtable();
            let _ = panic::catch_unwind(AssertUnwindSafe(|| (vtable.destroy)(self.handle)));

            self.handle = std::ptr::null_mut();
        }
    }
}

/// Wrap an FFI call with panic safety.
///
/// Panics in plugin code must never unwind across the FFI boundary; they
/// are caught here and converted to error codes.
fn catch_ffi_call<F>(f: F) -> (PixmuxErrorCode, Option<PixmuxError>)
where
    F: FnOnce() -> PixmuxErrorCode,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(code) => (code, None),
        Err(panic_info) => {
            let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                format!("Plugin panic: {}", s)
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                format!("Plugin panic: {}", s)
            } else {
                "Plugin panic: unknown error".to_string()
            };

            error!("Caught panic in plugin FFI call: {}", message);
            let panic_error = PixmuxError::new(PixmuxErrorCode::ErrorPanic, &message);
            (PixmuxErrorCode::ErrorPanic, Some(panic_error))
        }
    }
}
