/*
 *  PixMux Marquee Plugin
 *
 *  A producer plugin for the PixMux display multiplexer that scrolls a
 *  configurable line of text across the panel.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

//! # PixMux Marquee Producer Plugin
//!
//! Scrolls a configurable text line across the display. Doubles as the
//! reference implementation of the producer plugin ABI: one opaque
//! handle, one vtable, frames returned as packed 1-bpp buffers.
//!
//! ## Configuration
//!
//! ```yaml
//! producers:
//!   marquee:
//!     enabled: true
//!     text: "Hello from PixMux"
//!     duration_secs: 12
//!     speed: 2
//! ```

mod ffi;
mod plugin;

// Re-export the plugin registration function
pub use plugin::pixmux_producer_register;
