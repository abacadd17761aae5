/*
 *  lib.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Library root - the control core of a rotating-content pixel display
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

pub mod cache;
pub mod config;
pub mod error;
pub mod frame;
pub mod producer;
pub mod producers;
pub mod registry;
pub mod runloop;
pub mod scheduler;
pub mod sink;

// Re-exports for convenience
pub use cache::SharedCache;
pub use config::{Config, ScheduleConfig};
pub use error::{ProducerError, RegistryError};
pub use frame::Frame;
pub use producer::{Producer, ProducerCtx};
pub use registry::{Registry, manifest::Manifest};
pub use runloop::Core;
pub use scheduler::{Arbiter, DriveMode, OnDemandInfo};
pub use sink::{DisplaySink, MockSink, SharedSink};
