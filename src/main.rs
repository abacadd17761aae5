/*
 *  main.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
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

use anyhow::{bail, Context};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use pixmux::cache::SharedCache;
use pixmux::config::{self, Cli};
use pixmux::producer::ProducerCtx;
use pixmux::producers::ClockProducer;
use pixmux::registry::Registry;
use pixmux::runloop::Core;
use pixmux::scheduler::ScheduleGate;
use pixmux::sink::{NullSink, SharedSink};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Parse the --show argument: MODE[:SECS[:pin]]
///
/// `MODE` alone uses the mode's own dwell duration; `MODE:30` holds it
/// for 30 seconds; `MODE:0` or `MODE:30:pin` pins it until cleared.
fn parse_show(arg: &str) -> anyhow::Result<(String, Option<Duration>, bool)> {
    let mut parts = arg.splitn(3, ':');
    let mode = match parts.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => bail!("--show needs a mode name"),
    };

    let secs = match parts.next() {
        Some(s) => Some(
            s.parse::<u64>()
                .with_context(|| format!("--show seconds '{}' is not a number", s))?,
        ),
        None => None,
    };

    let pinned = match parts.next() {
        Some("pin") => true,
        Some(other) => bail!("--show trailer '{}' not understood (expected 'pin')", other),
        None => matches!(secs, Some(0)),
    };

    let duration = match secs {
        Some(0) | None => None,
        Some(s) => Some(Duration::from_secs(s)),
    };

    Ok((mode, duration, pinned))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(
        cli.log_level.as_deref().unwrap_or(default_level),
    ))
    .format_timestamp_secs()
    .init();

    info!("{} - one display, many voices", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let cfg = config::load(&cli)?;

    if cli.dump_config {
        println!("{}", serde_yaml::to_string(&cfg)?);
        return Ok(());
    }

    let (width, height) = cfg.frame_dimensions();
    let sink: SharedSink = Arc::new(Mutex::new(NullSink::new(width, height)));
    let cache = SharedCache::new();

    let plugin_root = cfg
        .plugin_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("plugins"));
    let producer_configs: HashMap<_, _> = cfg
        .producers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .collect();

    let mut registry = Registry::new(plugin_root, producer_configs, sink, cache.clone());

    // the built-in clock keeps the rotation non-empty from first boot
    let clock_config = cfg
        .producers
        .as_ref()
        .and_then(|p| p.get("clock"))
        .map(|p| p.config.clone())
        .unwrap_or(serde_yaml::Value::Null);
    let clock_ctx = ProducerCtx::new("clock", clock_config, registry.sink(), cache);
    match ClockProducer::new(clock_ctx) {
        Ok(clock) => {
            registry.register_builtin(Box::new(clock), vec!["clock".to_string()]);
        }
        Err(e) => warn!("Built-in clock unavailable: {}", e),
    }

    for id in registry.discover() {
        registry.load(&id);
    }

    let gate = ScheduleGate::from_config(cfg.schedule.as_ref());
    let mut core = Core::new(registry, gate, cfg.tick_interval());

    if let Some(arg) = cli.show.as_deref() {
        let (mode, duration, pinned) = parse_show(arg)?;
        if !core.show_on_demand(&mode, duration, pinned, Instant::now()) {
            bail!("--show mode '{}' is not provided by any loaded producer", mode);
        }
    }

    core.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show_variants() {
        let (mode, duration, pinned) = parse_show("weather").unwrap();
        assert_eq!(mode, "weather");
        assert_eq!(duration, None);
        assert!(!pinned);

        let (_, duration, pinned) = parse_show("weather:30").unwrap();
        assert_eq!(duration, Some(Duration::from_secs(30)));
        assert!(!pinned);

        let (_, duration, pinned) = parse_show("weather:0").unwrap();
        assert_eq!(duration, None);
        assert!(pinned);

        let (_, _, pinned) = parse_show("weather:30:pin").unwrap();
        assert!(pinned);
    }

    #[test]
    fn test_parse_show_rejects_garbage() {
        assert!(parse_show("").is_err());
        assert!(parse_show("weather:soon").is_err());
        assert!(parse_show("weather:30:forever").is_err());
    }
}
