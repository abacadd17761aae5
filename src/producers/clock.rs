/*
 *  producers/clock.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Built-in clock producer - HH:MM with a blinking colon
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

use chrono::Local;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_10X20};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Text};

use crate::error::ProducerError;
use crate::frame::Frame;
use crate::producer::{Producer, ProducerCtx};

/// The always-there producer: a centered HH:MM clock. Lives in-process so
/// the rotation is never empty even with zero plugin packages installed.
pub struct ClockProducer {
    ctx: ProducerCtx,
    frame: Frame,
    colon_on: bool,
    last_colon_toggle: Instant,
    twentyfour: bool,
    duration: Duration,
}

impl ClockProducer {
    pub fn new(ctx: ProducerCtx) -> Result<Self, ProducerError> {
        let (width, height) = {
            let sink = ctx
                .sink
                .lock()
                .map_err(|_| ProducerError::Other("sink mutex poisoned".to_string()))?;
            sink.dimensions()
        };

        let duration = Duration::from_secs(ctx.config_u64("duration_secs", 10));
        let twentyfour = ctx
            .config
            .get("twentyfour")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        Ok(Self {
            ctx,
            frame: Frame::new(width, height),
            colon_on: true,
            last_colon_toggle: Instant::now(),
            twentyfour,
            duration,
        })
    }

    fn time_string(&self) -> String {
        let now = Local::now();
        let fmt = if self.twentyfour {
            if self.colon_on { "%H:%M" } else { "%H %M" }
        } else if self.colon_on {
            "%I:%M"
        } else {
            "%I %M"
        };
        now.format(fmt).to_string()
    }

    fn toggle_colon(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_colon_toggle).as_millis() >= 500 {
            self.colon_on = !self.colon_on;
            self.last_colon_toggle = now;
        }
    }
}

impl Producer for ClockProducer {
    fn id(&self) -> &str {
        &self.ctx.id
    }

    fn update(&mut self) -> Result<(), ProducerError> {
        // the clock reads wall time at render; nothing to fetch
        Ok(())
    }

    fn display(&mut self, _mode: &str, force_clear: bool) -> Result<(), ProducerError> {
        if force_clear {
            self.frame.clear_all();
        }
        self.toggle_colon();

        self.frame.clear_all();
        let time_style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
        let date_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let cx = self.frame.width() as i32 / 2;
        let h = self.frame.height() as i32;

        let time_center = Point::new(cx, h / 2 + 2);
        Text::with_alignment(&self.time_string(), time_center, time_style, Alignment::Center)
            .draw(&mut self.frame)
            .map_err(|_| ProducerError::Render("clock text draw failed".to_string()))?;

        // date line tucked under the time when the panel is tall enough
        if h >= 32 {
            let date = Local::now().format("%a %d %b").to_string();
            let date_baseline = Point::new(cx, h - 4);
            Text::with_alignment(&date, date_baseline, date_style, Alignment::Center)
                .draw(&mut self.frame)
                .map_err(|_| ProducerError::Render("date text draw failed".to_string()))?;
        }

        let mut sink = self
            .ctx
            .sink
            .lock()
            .map_err(|_| ProducerError::Render("sink mutex poisoned".to_string()))?;
        sink.push_frame(&self.frame)
    }

    fn display_duration(&self) -> Duration {
        self.duration
    }

    fn on_config_change(&mut self, new_config: &serde_yaml::Value) {
        if let Some(secs) = new_config.get("duration_secs").and_then(|v| v.as_u64()) {
            self.duration = Duration::from_secs(secs);
        }
        if let Some(tf) = new_config.get("twentyfour").and_then(|v| v.as_bool()) {
            self.twentyfour = tf;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::cache::SharedCache;
    use crate::sink::{MockSink, SharedSink};

    fn clock_with_sink() -> (ClockProducer, MockSink) {
        let mock = MockSink::new(128, 64);
        let sink: SharedSink = Arc::new(Mutex::new(mock.clone()));
        let config: serde_yaml::Value =
            serde_yaml::from_str("duration_secs: 15\ntwentyfour: true\n").unwrap();
        let ctx = ProducerCtx::new("clock", config, sink, SharedCache::new());
        (ClockProducer::new(ctx).unwrap(), mock)
    }

    #[test]
    fn test_clock_pushes_a_nonblank_frame() {
        let (mut clock, mock) = clock_with_sink();
        clock.update().unwrap();
        clock.display("clock", true).unwrap();

        let state = mock.state();
        let s = state.lock().unwrap();
        assert_eq!(s.push_count, 1);
        assert!(s.last_frame.as_ref().unwrap().lit_pixels() > 0);
    }

    #[test]
    fn test_clock_honors_configured_duration() {
        let (clock, _) = clock_with_sink();
        assert_eq!(clock.display_duration(), Duration::from_secs(15));
    }

    #[test]
    fn test_clock_config_push_updates_duration() {
        let (mut clock, _) = clock_with_sink();
        let new: serde_yaml::Value = serde_yaml::from_str("duration_secs: 30\n").unwrap();
        clock.on_config_change(&new);
        assert_eq!(clock.display_duration(), Duration::from_secs(30));
    }
}
