/*
 *  producer.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  The Producer Contract - the capability every content source implements
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

use std::time::Duration;

use crate::cache::SharedCache;
use crate::error::ProducerError;
use crate::sink::SharedSink;

/// Everything a producer is handed at construction: its identity, its
/// config blob, the one shared display sink, and the shared cache.
#[derive(Clone)]
pub struct ProducerCtx {
    pub id: String,
    pub config: serde_yaml::Value,
    pub sink: SharedSink,
    pub cache: SharedCache,
}

impl ProducerCtx {
    pub fn new(id: &str, config: serde_yaml::Value, sink: SharedSink, cache: SharedCache) -> Self {
        Self {
            id: id.to_string(),
            config,
            sink,
            cache,
        }
    }

    /// Convenience accessor for a config key, with a default.
    pub fn config_u64(&self, key: &str, default: u64) -> u64 {
        self.config
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or(default)
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

/// The abstract capability every content producer implements, built-in or
/// plugin-provided. One producer may own several display modes.
///
/// All display work happens through the shared sink captured at
/// construction; only the main loop's current tick calls `display()`, so
/// no producer ever races another for the panel.
pub trait Producer: Send {
    /// Producer id (unique across the registry)
    fn id(&self) -> &str;

    /// Refresh whatever data this producer renders from.
    ///
    /// May block on I/O; the deferred update queue bounds how much that
    /// blocking disrupts rendering. May also be a fast cache read when a
    /// background worker feeds the shared cache.
    fn update(&mut self) -> Result<(), ProducerError>;

    /// Compose and push a frame for the given display mode.
    ///
    /// `force_clear` is set on every mode switch and after a failed
    /// render; the producer must not assume anything survives from the
    /// previous frame when it is set.
    fn display(&mut self, mode: &str, force_clear: bool) -> Result<(), ProducerError>;

    /// How long this producer's modes hold the display in normal
    /// rotation. Re-queried on every tick; may be computed dynamically.
    fn display_duration(&self) -> Duration;

    /// Whether this producer is allowed to preempt rotation at all
    fn has_live_priority(&self) -> bool {
        false
    }

    /// Whether this producer currently has time-critical content
    fn has_live_content(&self) -> bool {
        false
    }

    /// The modes to rotate among while this producer is live
    fn live_modes(&self) -> Vec<String> {
        Vec::new()
    }

    /// True while an animation (scroll, wipe) is in flight. Deferred
    /// updates are held until this goes false.
    fn is_animating(&self) -> bool {
        false
    }

    /// Producer-side config validation, called once at load time. A
    /// rejection aborts the load with no partial state.
    fn validate_config(&self) -> bool {
        true
    }

    /// Release any resources. Called by unload before the instance drops.
    fn cleanup(&mut self) {}

    fn on_enable(&mut self) {}

    fn on_disable(&mut self) {}

    /// Pushed config update from the persistence layer
    fn on_config_change(&mut self, _new_config: &serde_yaml::Value) {}
}
