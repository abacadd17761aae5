/*
 *  PixMux Marquee Plugin - Producer Implementation
 *
 *  Scrolls a configured line of text across the panel.
 */

use std::convert::Infallible;
use std::ffi::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use embedded_graphics::mono_font::ascii::FONT_8X13;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;

use crate::ffi::*;

/// A packed 1-bpp buffer the plugin composes into; 8 pixels per byte,
/// LSB first - the host's wire format.
struct PackedCanvas {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl PackedCanvas {
    fn new(width: u32, height: u32) -> Self {
        let pixels = (width * height) as usize;
        Self {
            bytes: vec![0u8; (pixels + 7) / 8],
            width,
            height,
        }
    }

    fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

impl OriginDimensions for PackedCanvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for PackedCanvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if p.x < 0 || p.y < 0 || p.x >= self.width as i32 || p.y >= self.height as i32 {
                continue;
            }
            let i = p.y as usize * self.width as usize + p.x as usize;
            if c.is_on() {
                self.bytes[i / 8] |= 1 << (i % 8);
            } else {
                self.bytes[i / 8] &= !(1 << (i % 8));
            }
        }
        Ok(())
    }
}

/// Internal marquee producer state
pub struct MarqueeProducer {
    text: String,
    canvas: PackedCanvas,

    /// Current scroll offset in pixels from the right edge
    offset: i32,

    /// Pixels advanced per rendered frame
    speed: i32,

    duration_ms: u64,

    /// True while the text is mid-scroll
    animating: bool,

    /// One full pass completed; the text rests until the next force_clear
    parked: bool,

    config_ok: bool,
}

impl MarqueeProducer {
    pub fn new(config_yaml: &str, width: u32, height: u32) -> Result<Self, String> {
        let config: serde_yaml::Value = if config_yaml.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(config_yaml).map_err(|e| format!("bad config: {}", e))?
        };

        let text = config
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("PixMux")
            .to_string();
        let speed = config.get("speed").and_then(|v| v.as_u64()).unwrap_or(2) as i32;
        let duration_ms = config
            .get("duration_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(10)
            * 1000;

        let config_ok = speed > 0 && !text.is_empty();

        Ok(Self {
            text,
            canvas: PackedCanvas::new(width, height),
            offset: width as i32,
            speed,
            duration_ms,
            animating: false,
            parked: false,
            config_ok,
        })
    }

    fn text_width(&self) -> i32 {
        self.text.len() as i32 * FONT_8X13.character_size.width as i32
    }

    fn render_frame(&mut self, force_clear: bool) -> Result<(), String> {
        if force_clear {
            self.offset = self.canvas.width as i32;
            self.parked = false;
        }
        self.canvas.clear();

        let baseline = (self.canvas.height as i32 + FONT_8X13.character_size.height as i32) / 2;
        let style = MonoTextStyle::new(&FONT_8X13, BinaryColor::On);
        let text = self.text.clone();
        Text::new(&text, Point::new(self.offset, baseline), style)
            .draw(&mut self.canvas)
            .map_err(|_| "text draw failed".to_string())?;

        if !self.parked {
            // advance; one full pass, then rest until the next force_clear
            self.offset -= self.speed;
            if self.offset < -self.text_width() {
                self.offset = 0;
                self.parked = true;
                self.animating = false;
            } else {
                self.animating = true;
            }
        }

        Ok(())
    }

    fn apply_config(&mut self, config_yaml: &str) {
        if let Ok(config) = serde_yaml::from_str::<serde_yaml::Value>(config_yaml) {
            if let Some(text) = config.get("text").and_then(|v| v.as_str()) {
                self.text = text.to_string();
                self.offset = self.canvas.width as i32;
                self.parked = false;
            }
            if let Some(speed) = config.get("speed").and_then(|v| v.as_u64()) {
                if speed > 0 {
                    self.speed = speed as i32;
                }
            }
            if let Some(secs) = config.get("duration_secs").and_then(|v| v.as_u64()) {
                self.duration_ms = secs * 1000;
            }
        }
    }
}

/// Macro to catch panics in FFI functions
macro_rules! catch_panic {
    ($error:expr, $code:block) => {
        match catch_unwind(AssertUnwindSafe(|| $code)) {
            Ok(result) => result,
            Err(panic_info) => {
                let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("Plugin panic: {}", s)
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    format!("Plugin panic: {}", s)
                } else {
                    "Plugin panic: unknown error".to_string()
                };

                unsafe {
                    *$error = PixmuxError::new(PixmuxErrorCode::ErrorPanic, &message);
                }
                PixmuxErrorCode::ErrorPanic
            }
        }
    };
}

// ============================================================================
// FFI Vtable Implementations
// ============================================================================

extern "C" fn abi_version(major: *mut u32, minor: *mut u32, patch: *mut u32) {
    if !major.is_null() && !minor.is_null() && !patch.is_null() {
        unsafe {
            *major = PIXMUX_PLUGIN_ABI_VERSION_MAJOR;
            *minor = PIXMUX_PLUGIN_ABI_VERSION_MINOR;
            *patch = PIXMUX_PLUGIN_ABI_VERSION_PATCH;
        }
    }
}

extern "C" fn plugin_info(name: *mut c_char, version: *mut c_char) {
    copy_str_to_buffer("PixMux Marquee", name, 64);
    copy_str_to_buffer(env!("CARGO_PKG_VERSION"), version, 32);
}

extern "C" fn create(
    _id: *const c_char,
    config_yaml: *const c_char,
    width: u32,
    height: u32,
    handle: *mut *mut PixmuxProducerHandle,
    error: *mut PixmuxError,
) -> PixmuxErrorCode {
    catch_panic!(error, {
        if handle.is_null() || error.is_null() || width == 0 || height == 0 {
            if !error.is_null() {
                unsafe {
                    *error = PixmuxError::new(
                        PixmuxErrorCode::ErrorInvalidArgument,
                        "Bad arguments to create",
                    );
                }
            }
            return PixmuxErrorCode::ErrorInvalidArgument;
        }

        let config = unsafe { string_from_ptr(config_yaml) };

        let producer = match MarqueeProducer::new(&config, width, height) {
            Ok(p) => p,
            Err(e) => {
                unsafe {
                    *error = PixmuxError::new(PixmuxErrorCode::ErrorGeneric, &e);
                }
                return PixmuxErrorCode::ErrorGeneric;
            }
        };

        unsafe {
            *handle = Box::into_raw(Box::new(producer)) as *mut PixmuxProducerHandle;
        }

        PixmuxErrorCode::Success
    })
}

extern "C" fn destroy(handle: *mut PixmuxProducerHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle as *mut MarqueeProducer);
        }
    }
}

extern "C" fn validate_config(handle: *const PixmuxProducerHandle) -> bool {
    if handle.is_null() {
        return false;
    }
    let producer = unsafe { &*(handle as *const MarqueeProducer) };
    producer.config_ok
}

extern "C" fn update(
    _handle: *mut PixmuxProducerHandle,
    _error: *mut PixmuxError,
) -> PixmuxErrorCode {
    // the marquee renders from config alone; nothing to fetch
    PixmuxErrorCode::Success
}

extern "C" fn render(
    handle: *mut PixmuxProducerHandle,
    _mode: *const c_char,
    force_clear: bool,
    buffer: *mut u8,
    buffer_len: usize,
    error: *mut PixmuxError,
) -> PixmuxErrorCode {
    catch_panic!(error, {
        if handle.is_null() || buffer.is_null() || error.is_null() {
            return PixmuxErrorCode::ErrorNullPointer;
        }

        let producer = unsafe { &mut *(handle as *mut MarqueeProducer) };

        if buffer_len < producer.canvas.bytes.len() {
            unsafe {
                *error = PixmuxError::new(
                    PixmuxErrorCode::ErrorRender,
                    "Frame buffer too small",
                );
            }
            return PixmuxErrorCode::ErrorRender;
        }

        if let Err(e) = producer.render_frame(force_clear) {
            unsafe {
                *error = PixmuxError::new(PixmuxErrorCode::ErrorRender, &e);
            }
            return PixmuxErrorCode::ErrorRender;
        }

        unsafe {
            std::ptr::copy_nonoverlapping(
                producer.canvas.bytes.as_ptr(),
                buffer,
                producer.canvas.bytes.len(),
            );
        }

        PixmuxErrorCode::Success
    })
}

extern "C" fn display_duration_ms(handle: *const PixmuxProducerHandle) -> u64 {
    if handle.is_null() {
        return 10_000;
    }
    let producer = unsafe { &*(handle as *const MarqueeProducer) };
    producer.duration_ms
}

extern "C" fn has_live_priority(_handle: *const PixmuxProducerHandle) -> bool {
    false
}

extern "C" fn has_live_content(_handle: *const PixmuxProducerHandle) -> bool {
    false
}

extern "C" fn live_modes(
    _handle: *const PixmuxProducerHandle,
    out: *mut c_char,
    capacity: usize,
) -> usize {
    copy_str_to_buffer("", out, capacity);
    0
}

extern "C" fn is_animating(handle: *const PixmuxProducerHandle) -> bool {
    if handle.is_null() {
        return false;
    }
    let producer = unsafe { &*(handle as *const MarqueeProducer) };
    producer.animating
}

extern "C" fn on_enable(_handle: *mut PixmuxProducerHandle) {}

extern "C" fn on_disable(_handle: *mut PixmuxProducerHandle) {}

extern "C" fn on_config_change(handle: *mut PixmuxProducerHandle, config_yaml: *const c_char) {
    if handle.is_null() {
        return;
    }
    let producer = unsafe { &mut *(handle as *mut MarqueeProducer) };
    let config = unsafe { string_from_ptr(config_yaml) };
    producer.apply_config(&config);
}

extern "C" fn cleanup(_handle: *mut PixmuxProducerHandle) {
    // no external resources to release
}

/// The static vtable handed to the host
static VTABLE: PixmuxProducerVTable = PixmuxProducerVTable {
    abi_version,
    plugin_info,
    create,
    destroy,
    validate_config,
    update,
    render,
    display_duration_ms,
    has_live_priority,
    has_live_content,
    live_modes,
    is_animating,
    on_enable,
    on_disable,
    on_config_change,
    cleanup,
};

/// Plugin registration entry point, named by the manifest's `class_name`
#[no_mangle]
pub extern "C" fn pixmux_producer_register() -> *const PixmuxProducerVTable {
    &VTABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marquee_scrolls_and_settles() {
        let mut m = MarqueeProducer::new("text: Hi\nspeed: 4\n", 32, 16).unwrap();
        assert!(m.config_ok);

        m.render_frame(true).unwrap();
        assert!(m.animating);

        // enough frames for "Hi" (16px) to cross a 32px panel at 4px/frame
        for _ in 0..20 {
            m.render_frame(false).unwrap();
        }
        assert!(!m.animating);
    }

    #[test]
    fn test_config_change_resets_scroll() {
        let mut m = MarqueeProducer::new("", 32, 16).unwrap();
        m.render_frame(true).unwrap();
        m.apply_config("text: New headline\n");
        assert_eq!(m.offset, 32);
        assert_eq!(m.text, "New headline");
    }

    #[test]
    fn test_empty_text_fails_validation() {
        let m = MarqueeProducer::new("text: \"\"\n", 32, 16).unwrap();
        assert!(!m.config_ok);
    }
}
