/*
 *  tests/scheduler_integration.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  End-to-end tests of the tick loop: arbitration, deferral, schedule
 *  gate, and failure containment, driven with explicit clocks.
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

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveTime;

use pixmux::cache::SharedCache;
use pixmux::config::parse_time_of_day;
use pixmux::error::ProducerError;
use pixmux::frame::Frame;
use pixmux::producer::Producer;
use pixmux::registry::Registry;
use pixmux::runloop::Core;
use pixmux::scheduler::{DriveMode, ScheduleGate};
use pixmux::sink::{MockSink, SharedSink};

/// Shared switches the tests flip to steer a fake producer
#[derive(Default)]
struct FakeState {
    live: bool,
    live_modes: Vec<String>,
    animating: bool,
    duration: Duration,
    update_count: usize,
    display_count: usize,
    fail_display: bool,
    panic_display: bool,
    panic_update: bool,
}

struct FakeProducer {
    id: String,
    state: Arc<Mutex<FakeState>>,
    sink: SharedSink,
}

impl Producer for FakeProducer {
    fn id(&self) -> &str {
        &self.id
    }

    fn update(&mut self) -> Result<(), ProducerError> {
        // the guard must drop before any injected panic, or the state
        // mutex poisons and the test's own assertions can't read it
        let panic_now = {
            let mut s = self.state.lock().unwrap();
            s.update_count += 1;
            s.panic_update
        };
        if panic_now {
            panic!("injected update panic");
        }
        Ok(())
    }

    fn display(&mut self, _mode: &str, _force_clear: bool) -> Result<(), ProducerError> {
        let (panic_now, fail_now) = {
            let mut s = self.state.lock().unwrap();
            s.display_count += 1;
            (s.panic_display, s.fail_display)
        };
        if panic_now {
            panic!("injected display panic");
        }
        if fail_now {
            return Err(ProducerError::Render("injected failure".to_string()));
        }
        let mut frame = Frame::new(8, 8);
        frame.load_packed_bytes(&[0xff; 8]);
        let mut sink = self.sink.lock().unwrap();
        sink.push_frame(&frame)
    }

    fn display_duration(&self) -> Duration {
        self.state.lock().unwrap().duration
    }

    fn has_live_priority(&self) -> bool {
        self.state.lock().unwrap().live
    }

    fn has_live_content(&self) -> bool {
        self.state.lock().unwrap().live
    }

    fn live_modes(&self) -> Vec<String> {
        self.state.lock().unwrap().live_modes.clone()
    }

    fn is_animating(&self) -> bool {
        self.state.lock().unwrap().animating
    }
}

struct Rig {
    core: Core,
    mock: MockSink,
    t0: Instant,
    noon: NaiveTime,
}

impl Rig {
    fn new() -> Self {
        Self::with_gate(ScheduleGate::always_on())
    }

    fn with_gate(gate: ScheduleGate) -> Self {
        let mock = MockSink::new(8, 8);
        let sink: SharedSink = Arc::new(Mutex::new(mock.clone()));
        let registry = Registry::new(
            PathBuf::from("/nonexistent"),
            HashMap::new(),
            sink,
            SharedCache::new(),
        );
        Self {
            core: Core::new(registry, gate, Duration::from_millis(250)),
            mock,
            t0: Instant::now(),
            noon: parse_time_of_day("12:00").unwrap(),
        }
    }

    fn add(&mut self, id: &str, duration_secs: u64) -> Arc<Mutex<FakeState>> {
        let state = Arc::new(Mutex::new(FakeState {
            duration: Duration::from_secs(duration_secs),
            ..Default::default()
        }));
        let producer = FakeProducer {
            id: id.to_string(),
            state: state.clone(),
            sink: self.core.registry().sink(),
        };
        self.core
            .registry_mut()
            .register_builtin(Box::new(producer), vec![id.to_string()]);
        state
    }

    fn tick_at(&mut self, secs_from_start: u64) -> Option<String> {
        self.core
            .tick(self.t0 + Duration::from_secs(secs_from_start), self.noon)
    }
}

#[test]
fn test_rotation_is_fair_over_many_cycles() {
    let mut rig = Rig::new();
    let a = rig.add("a", 2);
    let b = rig.add("b", 2);
    let c = rig.add("c", 2);

    // 30 seconds at 2s dwell: five full cycles of three modes
    for s in 0..30 {
        rig.tick_at(s);
    }

    let shows = |st: &Arc<Mutex<FakeState>>| st.lock().unwrap().display_count;
    let (sa, sb, sc) = (shows(&a), shows(&b), shows(&c));
    assert!(sa > 0 && sb > 0 && sc > 0);
    // each mode held the display the same share, within one dwell
    assert!(sa.abs_diff(sb) <= 2, "a={} b={}", sa, sb);
    assert!(sb.abs_diff(sc) <= 2, "b={} c={}", sb, sc);
}

#[test]
fn test_on_demand_expiry_boundary() {
    let mut rig = Rig::new();
    rig.add("a", 10);
    rig.add("b", 10);

    let t0 = rig.t0;
    rig.core
        .arbiter_mut()
        .show_on_demand("b", Some(Duration::from_secs(5)), false, t0);

    assert_eq!(rig.tick_at(0).as_deref(), Some("b"));
    assert_eq!(rig.tick_at(4).as_deref(), Some("b"));
    assert!(rig.core.arbiter().is_on_demand_active(t0 + Duration::from_secs(4)));

    // at exactly 5s the override is gone; rotation takes the display back
    assert_eq!(rig.tick_at(5).as_deref(), Some("a"));
    assert!(!rig.core.arbiter().is_on_demand_active(t0 + Duration::from_secs(5)));
}

#[test]
fn test_live_takeover_and_fallback_preserve_rotation() {
    let mut rig = Rig::new();
    rig.add("a", 5);
    rig.add("b", 5);
    let live = rig.add("sports", 5);

    assert_eq!(rig.tick_at(0).as_deref(), Some("a"));
    assert_eq!(rig.tick_at(5).as_deref(), Some("b"));

    {
        let mut s = live.lock().unwrap();
        s.live = true;
        s.live_modes = vec!["sports_live".to_string()];
    }
    assert_eq!(rig.tick_at(6).as_deref(), Some("sports_live"));
    assert_eq!(rig.core.arbiter().drive_mode(), DriveMode::Live);

    // live lapses: back to b, where rotation left off
    live.lock().unwrap().live = false;
    assert_eq!(rig.tick_at(7).as_deref(), Some("b"));
    assert_eq!(rig.core.arbiter().drive_mode(), DriveMode::Rotation);
}

#[test]
fn test_two_live_producers_share_the_takeover() {
    let mut rig = Rig::new();
    let a = rig.add("a", 2);
    let b = rig.add("b", 2);

    {
        let mut s = a.lock().unwrap();
        s.live = true;
        s.live_modes = vec!["a_live".to_string()];
    }
    {
        let mut s = b.lock().unwrap();
        s.live = true;
        s.live_modes = vec!["b_live".to_string()];
    }

    assert_eq!(rig.tick_at(0).as_deref(), Some("a_live"));
    assert_eq!(rig.tick_at(2).as_deref(), Some("b_live"));
    assert_eq!(rig.tick_at(4).as_deref(), Some("a_live"));

    // b's feed ends mid-takeover; a keeps the display alone
    b.lock().unwrap().live = false;
    assert_eq!(rig.tick_at(6).as_deref(), Some("a_live"));
    assert_eq!(rig.tick_at(8).as_deref(), Some("a_live"));
}

#[test]
fn test_updates_deferred_while_animating_then_drained() {
    let mut rig = Rig::new();
    let a = rig.add("a", 60);

    // the current producer refreshes from the second tick on
    rig.tick_at(0);
    rig.tick_at(1);
    let baseline = a.lock().unwrap().update_count;
    assert!(baseline > 0);

    // animation in flight: the per-tick update is parked instead of run
    a.lock().unwrap().animating = true;
    rig.tick_at(2);
    rig.tick_at(3);
    assert_eq!(a.lock().unwrap().update_count, baseline);
    assert!(rig.core.deferred_len() > 0);

    // quiescent again: the parked work drains on the next tick
    a.lock().unwrap().animating = false;
    rig.tick_at(4);
    assert!(a.lock().unwrap().update_count > baseline);
    assert_eq!(rig.core.deferred_len(), 0);
}

#[test]
fn test_schedule_gate_blanks_once_and_resumes() {
    let gate = ScheduleGate::new(
        parse_time_of_day("08:00").unwrap(),
        parse_time_of_day("18:00").unwrap(),
    );
    let mut rig = Rig::with_gate(gate);
    rig.add("a", 5);

    let day = parse_time_of_day("12:00").unwrap();
    let night = parse_time_of_day("23:00").unwrap();
    let t = rig.t0;

    assert!(rig.core.tick(t, day).is_some());

    // window closes: display blanked exactly once, nothing rendered
    assert!(rig.core.tick(t + Duration::from_secs(1), night).is_none());
    assert!(rig.core.tick(t + Duration::from_secs(2), night).is_none());
    {
        let state = rig.mock.state();
        let s = state.lock().unwrap();
        assert_eq!(s.clear_count, 1);
    }

    // window reopens: rendering resumes
    assert!(rig.core.tick(t + Duration::from_secs(3), day).is_some());
}

#[test]
fn test_overnight_gate_is_active_across_midnight() {
    let gate = ScheduleGate::new(
        parse_time_of_day("22:00").unwrap(),
        parse_time_of_day("06:00").unwrap(),
    );
    let mut rig = Rig::with_gate(gate);
    rig.add("a", 5);

    let t = rig.t0;
    assert!(rig
        .core
        .tick(t, parse_time_of_day("23:30").unwrap())
        .is_some());
    assert!(rig
        .core
        .tick(t + Duration::from_secs(1), parse_time_of_day("02:00").unwrap())
        .is_some());
    assert!(rig
        .core
        .tick(t + Duration::from_secs(2), parse_time_of_day("12:00").unwrap())
        .is_none());
}

#[test]
fn test_failed_render_does_not_kill_the_loop() {
    let mut rig = Rig::new();
    let a = rig.add("a", 60);

    a.lock().unwrap().fail_display = true;
    assert_eq!(rig.tick_at(0), None);

    // recovery: next successful frame repaints from scratch
    a.lock().unwrap().fail_display = false;
    assert_eq!(rig.tick_at(1).as_deref(), Some("a"));
}

#[test]
fn test_panicking_producer_is_contained() {
    let mut rig = Rig::new();
    let a = rig.add("a", 60);

    a.lock().unwrap().panic_display = true;
    assert_eq!(rig.tick_at(0), None);

    a.lock().unwrap().panic_display = false;
    assert_eq!(rig.tick_at(1).as_deref(), Some("a"));
}

#[test]
fn test_panicking_update_is_contained() {
    let mut rig = Rig::new();
    let a = rig.add("a", 60);

    assert_eq!(rig.tick_at(0).as_deref(), Some("a"));

    // the panic is fenced; the tick completes and still renders
    a.lock().unwrap().panic_update = true;
    assert_eq!(rig.tick_at(1).as_deref(), Some("a"));

    a.lock().unwrap().panic_update = false;
    assert_eq!(rig.tick_at(2).as_deref(), Some("a"));
}

#[test]
fn test_panicking_deferred_update_is_contained() {
    let mut rig = Rig::new();
    let a = rig.add("a", 60);

    rig.tick_at(0);
    a.lock().unwrap().animating = true;
    rig.tick_at(1);
    assert!(rig.core.deferred_len() > 0);

    // the parked update panics when drained; the loop survives it
    {
        let mut s = a.lock().unwrap();
        s.animating = false;
        s.panic_update = true;
    }
    assert_eq!(rig.tick_at(2).as_deref(), Some("a"));
    assert_eq!(rig.core.deferred_len(), 0);
}

#[test]
fn test_unloading_current_producer_mid_rotation() {
    let mut rig = Rig::new();
    rig.add("a", 5);
    rig.add("b", 5);

    assert_eq!(rig.tick_at(0).as_deref(), Some("a"));
    assert!(rig.core.registry_mut().unload("a"));

    // the survivor takes over; no stale mode lingers
    assert_eq!(rig.tick_at(1).as_deref(), Some("b"));
    assert_eq!(rig.tick_at(10).as_deref(), Some("b"));
}

#[test]
fn test_empty_registry_blanks_display() {
    let mut rig = Rig::new();
    rig.add("a", 5);

    assert_eq!(rig.tick_at(0).as_deref(), Some("a"));
    rig.core.registry_mut().unload("a");

    assert_eq!(rig.tick_at(1), None);
    let state = rig.mock.state();
    assert_eq!(state.lock().unwrap().clear_count, 1);
}
