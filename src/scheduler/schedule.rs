/*
 *  scheduler/schedule.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Schedule gate - the wall-clock window the display is allowed to shine in
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

use chrono::NaiveTime;
use log::warn;

use crate::config::{parse_time_of_day, ScheduleConfig};

/// Wall-clock window outside which the display stays dark.
///
/// `start > end` wraps overnight: a 22:00-06:00 window is active from
/// 22:00 through midnight to 05:59:59. The boundary is half-open at the
/// end, closed at the start.
#[derive(Debug, Clone)]
pub struct ScheduleGate {
    enabled: bool,
    start: NaiveTime,
    end: NaiveTime,
}

impl ScheduleGate {
    /// An always-open gate
    pub fn always_on() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }

    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled: true,
            start,
            end,
        }
    }

    /// Build from the config layer; malformed or missing times fall back
    /// to an always-open gate with a warning.
    pub fn from_config(config: Option<&ScheduleConfig>) -> Self {
        let config = match config {
            Some(c) if c.enabled.unwrap_or(false) => c,
            _ => return Self::always_on(),
        };

        let parse = |field: &Option<String>, name: &str| -> Option<NaiveTime> {
            match field {
                Some(s) => {
                    let t = parse_time_of_day(s);
                    if t.is_none() {
                        warn!("Schedule {} '{}' unparseable; schedule disabled", name, s);
                    }
                    t
                }
                None => {
                    warn!("Schedule enabled but {} missing; schedule disabled", name);
                    None
                }
            }
        };

        match (parse(&config.start, "start"), parse(&config.end, "end")) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Self::always_on(),
        }
    }

    /// Whether the display may be lit at this wall-clock time
    pub fn is_active(&self, wall: NaiveTime) -> bool {
        if !self.enabled {
            return true;
        }

        if self.start <= self.end {
            // same-day window
            wall >= self.start && wall < self.end
        } else {
            // overnight wrap
            wall >= self.start || wall < self.end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        parse_time_of_day(s).unwrap()
    }

    #[test]
    fn test_overnight_window_wraps_midnight() {
        let gate = ScheduleGate::new(t("22:00"), t("06:00"));

        assert!(gate.is_active(t("23:30")));
        assert!(gate.is_active(t("02:00")));
        assert!(!gate.is_active(t("12:00")));

        // boundaries: closed at start, open at end
        assert!(gate.is_active(t("22:00")));
        assert!(!gate.is_active(t("06:00")));
    }

    #[test]
    fn test_same_day_window() {
        let gate = ScheduleGate::new(t("08:00"), t("18:00"));

        assert!(gate.is_active(t("12:00")));
        assert!(!gate.is_active(t("07:59")));
        assert!(!gate.is_active(t("18:00")));
    }

    #[test]
    fn test_disabled_gate_is_always_open() {
        let gate = ScheduleGate::always_on();
        assert!(gate.is_active(t("03:00")));
        assert!(gate.is_active(t("15:00")));
    }

    #[test]
    fn test_bad_config_falls_back_open() {
        let config = ScheduleConfig {
            enabled: Some(true),
            start: Some("not-a-time".to_string()),
            end: Some("06:00".to_string()),
        };
        let gate = ScheduleGate::from_config(Some(&config));
        assert!(gate.is_active(t("12:00")));
    }
}
