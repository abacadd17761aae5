/*
 *  scheduler/ondemand.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  On-demand override state - the strongest claim on the display
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

use std::time::{Duration, Instant};

/// An operator-requested override: hold one mode on the display for a
/// bounded time, or pin it until explicitly cleared.
#[derive(Debug, Clone)]
pub struct OnDemandState {
    pub mode: String,

    started: Instant,

    duration: Option<Duration>,

    /// Pinned overrides never expire; the duration is informational
    pinned: bool,
}

/// Read-only snapshot of the active override, for status queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDemandInfo {
    pub mode: String,
    pub duration: Option<Duration>,
    pub elapsed: Duration,
    pub remaining: Option<Duration>,
    pub pinned: bool,
}

impl OnDemandState {
    pub fn new(mode: &str, duration: Option<Duration>, pinned: bool, started: Instant) -> Self {
        Self {
            mode: mode.to_string(),
            started,
            duration,
            pinned,
        }
    }

    /// Expired exactly when the elapsed time reaches the duration. An
    /// override with duration 5s is active for ticks in [0s, 5s) and
    /// expired at 5s. Pinned overrides never expire.
    pub fn expired(&self, now: Instant) -> bool {
        if self.pinned {
            return false;
        }
        match self.duration {
            Some(d) => now.duration_since(self.started) >= d,
            None => false,
        }
    }

    pub fn info(&self, now: Instant) -> OnDemandInfo {
        let elapsed = now.duration_since(self.started);
        let remaining = if self.pinned {
            None
        } else {
            self.duration.map(|d| d.saturating_sub(elapsed))
        };
        OnDemandInfo {
            mode: self.mode.clone(),
            duration: self.duration,
            elapsed,
            remaining,
            pinned: self.pinned,
        }
    }
}
