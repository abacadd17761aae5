/*
 *  runloop.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  The main loop - one tick: gate, update, drain, arbitrate, render
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

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveTime};
use log::{debug, error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;

use crate::registry::Registry;
use crate::scheduler::{
    Arbiter, DeferredQueue, ScheduleGate, PRIORITY_CURRENT, PRIORITY_REFRESH,
};

/// Ticks between background refresh sweeps of every enabled producer
const REFRESH_SWEEP_TICKS: u64 = 240;

/// The appliance core: registry + arbiter + deferred queue + gate,
/// advanced one tick at a time.
///
/// `tick()` takes the clock readings as arguments so tests drive time
/// explicitly; `run()` feeds it from the tokio timer and OS signals.
pub struct Core {
    registry: Registry,
    arbiter: Arbiter,
    deferred: DeferredQueue,
    gate: ScheduleGate,
    tick_interval: Duration,
    tick_count: u64,
    gate_was_active: bool,
    last_rendered: Option<String>,
}

impl Core {
    pub fn new(registry: Registry, gate: ScheduleGate, tick_interval: Duration) -> Self {
        Self {
            registry,
            arbiter: Arbiter::new(),
            deferred: DeferredQueue::new(),
            gate,
            tick_interval,
            tick_count: 0,
            gate_was_active: true,
            last_rendered: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub fn arbiter_mut(&mut self) -> &mut Arbiter {
        &mut self.arbiter
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Operator on-demand request. Unknown modes are rejected here,
    /// synchronously, rather than surfacing as a render failure later.
    ///
    /// `duration: None` uses the target mode's own dwell; `pinned` holds
    /// the mode until an explicit clear regardless of duration.
    pub fn show_on_demand(
        &mut self,
        mode: &str,
        duration: Option<Duration>,
        pinned: bool,
        now: Instant,
    ) -> bool {
        if !self.registry.has_mode(mode) {
            warn!("On-demand rejected: no producer provides mode '{}'", mode);
            return false;
        }
        let duration = match duration {
            Some(d) => Some(d),
            None if pinned => None,
            None => self.registry.duration_of_mode(mode),
        };
        self.arbiter.show_on_demand(mode, duration, pinned, now);
        true
    }

    pub fn clear_on_demand(&mut self) -> bool {
        self.arbiter.clear_on_demand()
    }

    /// One pass of the appliance loop. Returns the mode rendered this
    /// tick, if any.
    ///
    /// Order: schedule gate, current-producer update (deferred while it
    /// animates), deferred drain, arbitration, render. Every producer
    /// failure is contained to its own step; the loop never dies on one.
    pub fn tick(&mut self, now: Instant, wall: NaiveTime) -> Option<String> {
        self.tick_count += 1;

        // 1. schedule gate
        if !self.gate.is_active(wall) {
            if self.gate_was_active {
                info!("Schedule window closed; blanking display");
                self.blank_sink();
                self.gate_was_active = false;
                self.last_rendered = None;
            }
            return None;
        }
        if !self.gate_was_active {
            info!("Schedule window open; resuming");
            self.gate_was_active = true;
            self.arbiter.force_clear_next();
        }

        // 2. refresh the producer whose mode is showing; park the work if
        //    it is mid-animation
        if let Some(owner) = self
            .arbiter
            .current_mode()
            .and_then(|m| self.registry.owner_of(m))
            .map(str::to_string)
        {
            if self.registry.is_animating(&owner) {
                self.deferred.push(&owner, PRIORITY_CURRENT);
            } else {
                self.fenced_update(&owner);
            }
        }

        // periodic sweep keeps idle producers' data warm
        if self.tick_count % REFRESH_SWEEP_TICKS == 0 {
            for id in self.registry.producer_ids() {
                if self.registry.is_enabled(&id) {
                    self.deferred.push(&id, PRIORITY_REFRESH);
                }
            }
        }

        // 3. drain parked updates once nothing is animating
        if !self.deferred.is_empty() && self.registry.is_quiescent() {
            for task in self.deferred.drain() {
                if !self.registry.is_loaded(&task.producer_id) {
                    continue;
                }
                self.fenced_update(&task.producer_id);
            }
        }

        // 4-5. arbitrate
        let selection = self.arbiter.resolve(&self.registry, now);

        // 6. render, with the producer fenced off from the loop
        let mode = match selection.mode {
            Some(m) => m,
            None => {
                if self.last_rendered.take().is_some() {
                    debug!("Nothing eligible; blanking display");
                    self.blank_sink();
                }
                return None;
            }
        };

        let render = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry.display(&mode, selection.force_clear)
        }));

        match render {
            Ok(Ok(())) => {
                self.last_rendered = Some(mode.clone());
                Some(mode)
            }
            Ok(Err(e)) => {
                error!("Render failed for mode '{}': {}", mode, e);
                self.arbiter.force_clear_next();
                None
            }
            Err(_) => {
                error!("Producer panicked rendering mode '{}'", mode);
                self.arbiter.force_clear_next();
                None
            }
        }
    }

    /// Run a producer's update with the same panic fence rendering gets;
    /// a misbehaving producer must never take the loop down with it.
    fn fenced_update(&mut self, id: &str) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.registry.update(id))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Update failed for '{}': {}", id, e),
            Err(_) => error!("Producer '{}' panicked in update", id),
        }
    }

    fn blank_sink(&mut self) {
        let sink = self.registry.sink();
        match sink.lock() {
            Ok(mut guard) => {
                if let Err(e) = guard.clear() {
                    warn!("Display clear failed: {}", e);
                }
            }
            Err(_) => warn!("Sink mutex poisoned; cannot blank display"),
        }
    }

    /// Hot-reload every plugin producer in place. Built-ins are skipped.
    pub fn reload_plugins(&mut self) {
        info!("Reloading plugin producers");
        for id in self.registry.producer_ids() {
            if !self.registry.is_plugin(&id) {
                continue;
            }
            self.deferred.discard(&id);
            self.registry.reload(&id);
        }
        self.arbiter.force_clear_next();
    }

    /// Drive the loop from the tokio timer until a shutdown signal.
    ///
    /// SIGHUP hot-reloads all plugins; SIGINT/SIGTERM exit cleanly with
    /// the display blanked and every producer unloaded.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sighup = signal(SignalKind::hangup())?;

        info!("Main loop running ({}ms tick)", self.tick_interval.as_millis());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Instant::now(), Local::now().time());
                }
                _ = sigint.recv() => {
                    info!("SIGINT received; shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received; shutting down");
                    break;
                }
                _ = sighup.recv() => {
                    self.reload_plugins();
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Blank the display and unload everything, newest first
    pub fn shutdown(&mut self) {
        info!("Shutting down: blanking display, unloading producers");
        self.blank_sink();
        self.registry.unload_all();
    }
}
