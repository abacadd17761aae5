/*
 *  scheduler/mod.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  The arbiter - who owns the display this tick
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

//! Per-tick display arbitration
//!
//! Three claims compete for the panel, strongest first:
//!
//! 1. **On-demand** - an operator pinned a mode; nothing else shows.
//! 2. **Live priority** - a producer has time-critical content; the live
//!    set rotates among its declared live modes.
//! 3. **Rotation** - plain round-robin over every enabled mode.
//!
//! Arbitration is re-resolved from scratch every tick, so a stronger
//! claim takes over mid-dwell and the display falls back the instant it
//! lapses. The rotation cursor is never reset by an excursion.

pub mod deferred;
pub mod live;
pub mod ondemand;
pub mod rotation;
pub mod schedule;

pub use deferred::{DeferredQueue, DeferredTask, PRIORITY_CURRENT, PRIORITY_REFRESH};
pub use ondemand::{OnDemandInfo, OnDemandState};
pub use rotation::RotationState;
pub use schedule::ScheduleGate;

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::registry::Registry;

/// Which claim currently drives the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    OnDemand,
    Live,
    Rotation,
}

/// The arbiter's answer for one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Mode to render, or None when nothing is eligible
    pub mode: Option<String>,

    /// True on the first frame after a mode switch (or after a failed
    /// render); the producer must repaint from scratch
    pub force_clear: bool,
}

/// Resolves the three competing claims into one mode per tick.
pub struct Arbiter {
    rotation: RotationState,
    ondemand: Option<OnDemandState>,
    drive: DriveMode,
    current_mode: Option<String>,
    last_switch: Option<Instant>,
    pending_force_clear: bool,
}

impl Arbiter {
    pub fn new() -> Self {
        Self {
            rotation: RotationState::new(),
            ondemand: None,
            drive: DriveMode::Rotation,
            current_mode: None,
            last_switch: None,
            pending_force_clear: false,
        }
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.drive
    }

    pub fn current_mode(&self) -> Option<&str> {
        self.current_mode.as_deref()
    }

    /// Make the next selection carry `force_clear` even without a mode
    /// switch. Used after a failed render.
    pub fn force_clear_next(&mut self) {
        self.pending_force_clear = true;
    }

    // ---- operator surface --------------------------------------------

    /// Put a mode up on-demand. `pinned` holds it until an explicit
    /// clear; otherwise it runs out its duration. Replaces any active
    /// override, and always repaints - even when the requested mode is
    /// the one already showing.
    pub fn show_on_demand(
        &mut self,
        mode: &str,
        duration: Option<Duration>,
        pinned: bool,
        now: Instant,
    ) {
        info!(
            "On-demand: '{}' for {}",
            mode,
            if pinned {
                "ever".to_string()
            } else {
                duration.map_or("one dwell".to_string(), |d| format!("{:?}", d))
            }
        );
        self.ondemand = Some(OnDemandState::new(mode, duration, pinned, now));
        self.pending_force_clear = true;
    }

    /// Explicitly end the override. Returns true if one was active.
    pub fn clear_on_demand(&mut self) -> bool {
        if self.ondemand.take().is_some() {
            info!("On-demand cleared");
            true
        } else {
            false
        }
    }

    pub fn is_on_demand_active(&self, now: Instant) -> bool {
        self.ondemand.as_ref().is_some_and(|od| !od.expired(now))
    }

    pub fn on_demand_info(&self, now: Instant) -> Option<OnDemandInfo> {
        self.ondemand
            .as_ref()
            .filter(|od| !od.expired(now))
            .map(|od| od.info(now))
    }

    // ---- arbitration --------------------------------------------------

    /// Resolve what the display shows this tick.
    ///
    /// Durations are asked of the owning producers afresh on every call,
    /// so a producer may stretch or shrink its dwell dynamically.
    pub fn resolve(&mut self, registry: &Registry, now: Instant) -> Selection {
        // 1. on-demand override
        if let Some(od) = &self.ondemand {
            if od.expired(now) {
                info!("On-demand '{}' expired", od.mode);
                self.ondemand = None;
            }
        }
        if let Some(od) = &self.ondemand {
            let mode = od.mode.clone();
            self.drive = DriveMode::OnDemand;
            self.switch_to(&mode, now);
            return self.selection();
        }

        // 2. live takeover
        let live_set = registry.live_modes_in_order();
        if !live_set.is_empty() {
            self.drive = DriveMode::Live;

            if !live::in_live_set(&live_set, self.current_mode.as_deref()) {
                if let Some(first) = live_set.first() {
                    let first = first.clone();
                    self.switch_to(&first, now);
                }
            } else if self.dwell_elapsed(registry, now) {
                if let Some(next) = live::next_live_mode(&live_set, self.current_mode.as_deref())
                {
                    self.switch_to(&next, now);
                }
            }
            return self.selection();
        }

        // 3. rotation
        self.drive = DriveMode::Rotation;
        let modes = registry.available_modes();
        if modes.is_empty() {
            if self.current_mode.take().is_some() {
                debug!("No eligible modes; display idles");
                self.pending_force_clear = true;
            }
            return self.selection();
        }

        let pointed = match self.rotation.current(&modes) {
            Some(m) => m.to_string(),
            None => return self.selection(),
        };

        if self.current_mode.as_deref() != Some(pointed.as_str()) {
            // resuming rotation after an excursion (or first tick)
            self.switch_to(&pointed, now);
        } else if self.dwell_elapsed(registry, now) {
            if let Some(next) = self.rotation.advance(&modes) {
                self.switch_to(&next, now);
            }
        }
        self.selection()
    }

    fn switch_to(&mut self, mode: &str, now: Instant) {
        if self.current_mode.as_deref() != Some(mode) {
            debug!(
                "Mode switch: {} -> {} ({:?})",
                self.current_mode.as_deref().unwrap_or("<none>"),
                mode,
                self.drive
            );
            self.current_mode = Some(mode.to_string());
            self.last_switch = Some(now);
            self.pending_force_clear = true;
        }
    }

    fn dwell_elapsed(&self, registry: &Registry, now: Instant) -> bool {
        let (mode, since) = match (&self.current_mode, self.last_switch) {
            (Some(m), Some(t)) => (m, t),
            _ => return true,
        };
        match registry.duration_of_mode(mode) {
            Some(d) => now.duration_since(since) >= d,
            // owner vanished; move on immediately
            None => true,
        }
    }

    fn selection(&mut self) -> Selection {
        Selection {
            mode: self.current_mode.clone(),
            force_clear: std::mem::take(&mut self.pending_force_clear),
        }
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}
