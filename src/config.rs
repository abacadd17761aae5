/*
 *  config.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Layered configuration: defaults -> YAML file -> CLI overrides
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

use std::collections::BTreeMap;
use std::{fs, path::{Path, PathBuf}};

use chrono::NaiveTime;
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// e.g., "info" | "debug"
    pub log_level: Option<String>,

    /// Main loop tick interval in milliseconds
    pub tick_ms: Option<u64>,

    /// Directory scanned for producer plugin packages
    pub plugin_root: Option<PathBuf>,

    /// Display geometry (the sink is external; the core only needs the
    /// frame dimensions producers compose into)
    pub display: Option<DisplayGeometry>,

    /// Wall-clock window outside which the display is dark
    pub schedule: Option<ScheduleConfig>,

    /// Per-producer enabled flag and opaque config blob, keyed by id
    pub producers: Option<BTreeMap<String, ProducerConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayGeometry {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    pub enabled: Option<bool>,
    /// "HH:MM"; start > end wraps overnight
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Opaque blob passed through to the producer at construction
    #[serde(default, flatten)]
    pub config: serde_yaml::Value,
}

fn default_true() -> bool {
    true
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // empty mapping rather than Null so the flatten round-trips
            config: serde_yaml::Value::Mapping(Default::default()),
        }
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "pixmux", version, about = "One shared pixel display, many competing content producers")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(short = 'v', long, alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub tick_ms: Option<u64>,
    /// Directory scanned for producer plugin packages
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub plugin_root: Option<PathBuf>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    /// Force a mode on-demand at startup: MODE[:SECS[:pin]]
    #[arg(long)]
    pub show: Option<String>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: read YAML, merge, validate. The caller parses the
/// CLI (it also owns flags the config layer knows nothing about).
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/pixmux/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/pixmux/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/pixmux.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["pixmux.yaml", "config.yaml", "config/pixmux.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()    { dst.log_level = src.log_level; }
    if src.tick_ms.is_some()      { dst.tick_ms = src.tick_ms; }
    if src.plugin_root.is_some()  { dst.plugin_root = src.plugin_root; }
    if src.producers.is_some()    { dst.producers = src.producers; }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => {
            if s.width.is_some()  { d.width = s.width; }
            if s.height.is_some() { d.height = s.height; }
        }
        _ => {}
    }
    match (&mut dst.schedule, src.schedule) {
        (None, Some(c)) => dst.schedule = Some(c),
        (Some(d), Some(s)) => {
            if s.enabled.is_some() { d.enabled = s.enabled; }
            if s.start.is_some()   { d.start = s.start; }
            if s.end.is_some()     { d.end = s.end; }
        }
        _ => {}
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()   { cfg.log_level = cli.log_level.clone(); }
    if cli.tick_ms.is_some()     { cfg.tick_ms = cli.tick_ms; }
    if cli.plugin_root.is_some() { cfg.plugin_root = cli.plugin_root.clone(); }

    let any_geometry = cli.display_width.is_some() || cli.display_height.is_some();
    if any_geometry && cfg.display.is_none() {
        cfg.display = Some(DisplayGeometry::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_width.is_some()  { display.width = cli.display_width; }
        if cli.display_height.is_some() { display.height = cli.display_height; }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(tick) = cfg.tick_ms {
        if tick == 0 {
            return Err(ConfigError::Validation("tick_ms must be > 0".into()));
        }
    }
    if let Some(display) = cfg.display.as_ref() {
        if let (Some(w), Some(h)) = (display.width, display.height) {
            if w == 0 || h == 0 {
                return Err(ConfigError::Validation("display width/height must be > 0".into()));
            }
        }
    }
    if let Some(schedule) = cfg.schedule.as_ref() {
        for (name, field) in [("start", &schedule.start), ("end", &schedule.end)] {
            if let Some(s) = field {
                parse_time_of_day(s).ok_or_else(|| {
                    ConfigError::Validation(format!("schedule {} must be HH:MM, got '{}'", name, s))
                })?;
            }
        }
    }
    Ok(())
}

/// Parse "HH:MM" (or "HH:MM:SS") into a time of day.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

impl Config {
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_ms.unwrap_or(250))
    }

    pub fn frame_dimensions(&self) -> (u32, u32) {
        let d = self.display.clone().unwrap_or_default();
        (d.width.unwrap_or(128), d.height.unwrap_or(64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_zero_tick_rejected() {
        let cfg = Config { tick_ms: Some(0), ..Default::default() };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_bad_schedule_time_rejected() {
        let cfg = Config {
            schedule: Some(ScheduleConfig {
                enabled: Some(true),
                start: Some("25:99".to_string()),
                end: Some("06:00".to_string()),
            }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_producer_blob_passthrough() {
        let yaml = r#"
tick_ms: 100
producers:
  clock:
    enabled: true
    duration_secs: 15
    twentyfour: true
  scores:
    enabled: false
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let producers = cfg.producers.unwrap();

        let clock = &producers["clock"];
        assert!(clock.enabled);
        assert_eq!(clock.config.get("duration_secs").and_then(|v| v.as_u64()), Some(15));

        assert!(!producers["scores"].enabled);
    }

    #[test]
    fn test_time_of_day_parsing() {
        assert!(parse_time_of_day("22:00").is_some());
        assert!(parse_time_of_day("06:30:15").is_some());
        assert!(parse_time_of_day("noonish").is_none());
    }
}
