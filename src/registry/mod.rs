/*
 *  registry/mod.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Producer registry - discover, load, hot-reload, unload content producers
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

//! The producer registry
//!
//! Owns every loaded producer and the mode namespace they publish into.
//! A producer arrives either as a built-in (a Rust value registered
//! directly) or as a plugin package on disk (manifest + shared library).
//! Load failures are contained: a bad package is logged, skipped, and
//! leaves no partial state behind.

pub mod adapter;
pub mod ffi;
pub mod loader;
pub mod manifest;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use log::{error, info, warn};

use crate::cache::SharedCache;
use crate::config::ProducerConfig;
use crate::error::{ProducerError, RegistryError};
use crate::producer::Producer;
use crate::sink::SharedSink;

use adapter::PluginProducer;
use manifest::{DiscoveredPackage, Manifest};

/// Directory-name fallback prefix for plugin packages
const PACKAGE_PREFIX: &str = "pixmux-plugin-";

/// Where a loaded producer came from
enum ProducerSource {
    Builtin,
    Plugin { dir: PathBuf },
}

/// A loaded producer plus its registry bookkeeping
struct RegistryEntry {
    producer: Box<dyn Producer>,
    enabled: bool,
    modes: Vec<String>,
    source: ProducerSource,
}

/// One mode -> owning producer binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeBinding {
    pub mode: String,
    pub owner: String,
}

/// Record of a mode claimed by two producers. The later load wins; the
/// ledger keeps the history queryable.
#[derive(Debug, Clone)]
pub struct ModeCollision {
    pub mode: String,
    pub previous_owner: String,
    pub new_owner: String,
}

/// The registry: every producer the system knows about, loaded or merely
/// discovered, plus the mode namespace.
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,

    /// Producer ids in registration order. Rotation order derives from
    /// this, so it must be stable across enable/disable flips.
    order: Vec<String>,

    /// Mode bindings in registration order
    bindings: Vec<ModeBinding>,

    /// Every mode-ownership collision seen so far
    collisions: Vec<ModeCollision>,

    /// Packages found by the last `discover()` pass, keyed by id
    discovered: HashMap<String, DiscoveredPackage>,

    plugin_root: PathBuf,

    /// Per-producer config blobs and enabled flags from the config layer
    producer_configs: HashMap<String, ProducerConfig>,

    sink: SharedSink,

    cache: SharedCache,
}

impl Registry {
    pub fn new(
        plugin_root: PathBuf,
        producer_configs: HashMap<String, ProducerConfig>,
        sink: SharedSink,
        cache: SharedCache,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            bindings: Vec::new(),
            collisions: Vec::new(),
            discovered: HashMap::new(),
            plugin_root,
            producer_configs,
            sink,
            cache,
        }
    }

    pub fn sink(&self) -> SharedSink {
        self.sink.clone()
    }

    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    /// Scan the plugin root and refresh the discovered-package table.
    ///
    /// Pure discovery: nothing is loaded, no loaded state is touched.
    /// Returns the discovered ids in sorted order.
    pub fn discover(&mut self) -> Vec<String> {
        let packages = manifest::discover_in(&self.plugin_root);

        self.discovered.clear();
        let mut ids = Vec::with_capacity(packages.len());
        for package in packages {
            ids.push(package.manifest.id.clone());
            self.discovered.insert(package.manifest.id.clone(), package);
        }

        info!("Discovered {} plugin package(s): {:?}", ids.len(), ids);
        ids
    }

    /// Register a built-in producer (compiled into the host).
    ///
    /// Goes through the same mode-binding path as plugins so built-ins and
    /// plugins collide on equal footing.
    pub fn register_builtin(&mut self, producer: Box<dyn Producer>, modes: Vec<String>) -> bool {
        let id = producer.id().to_string();

        if self.entries.contains_key(&id) {
            warn!("Producer '{}' already registered; ignoring", id);
            return false;
        }

        if !producer.validate_config() {
            error!("Built-in producer '{}' rejected its config; not registered", id);
            return false;
        }

        let enabled = self.config_enabled(&id);
        self.insert_entry(
            id,
            RegistryEntry {
                producer,
                enabled,
                modes,
                source: ProducerSource::Builtin,
            },
        );
        true
    }

    /// Load a discovered plugin producer by id. Loading an id that is
    /// already loaded is a no-op success.
    ///
    /// On any failure the error is logged and the registry is exactly as
    /// it was before the call.
    pub fn load(&mut self, id: &str) -> bool {
        if self.entries.contains_key(id) {
            info!("Producer '{}' already loaded", id);
            return true;
        }
        match self.try_load(id) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to load producer '{}': {}", id, e);
                false
            }
        }
    }

    fn try_load(&mut self, id: &str) -> Result<(), RegistryError> {
        // Discovered table first, then a direct path probe so a package
        // dropped in after the last discover() pass still loads.
        let package = match self.discovered.get(id) {
            Some(p) => p.clone(),
            None => {
                let dir = loader::resolve_package_dir(&self.plugin_root, id, PACKAGE_PREFIX)
                    .ok_or_else(|| RegistryError::PackageNotFound(id.to_string()))?;
                let manifest = Manifest::from_file(&dir.join(manifest::MANIFEST_FILE))?;
                DiscoveredPackage { manifest, dir }
            }
        };

        let plugin = loader::load_plugin(&package.dir, &package.manifest)?;

        let config = self
            .producer_configs
            .get(id)
            .map(|c| c.config.clone())
            .unwrap_or(serde_yaml::Value::Null);

        let producer = PluginProducer::new(plugin, id, &config, self.sink.clone())
            .map_err(|e| RegistryError::Construction(e.to_string()))?;

        if !producer.validate_config() {
            // drops the instance and its library; no partial state remains
            return Err(RegistryError::ConfigRejected(id.to_string()));
        }

        info!(
            "Producer '{}' loaded ({} v{})",
            id,
            producer.plugin_name(),
            producer.plugin_version()
        );

        let enabled = self.config_enabled(id);
        let modes = package.manifest.modes();
        self.insert_entry(
            id.to_string(),
            RegistryEntry {
                producer: Box::new(producer),
                enabled,
                modes,
                source: ProducerSource::Plugin { dir: package.dir },
            },
        );
        Ok(())
    }

    /// Unload a producer: cleanup hook, mode unbinding, instance drop.
    ///
    /// Idempotent - unloading an id that is not loaded is a logged no-op
    /// returning false.
    pub fn unload(&mut self, id: &str) -> bool {
        let mut entry = match self.entries.remove(id) {
            Some(e) => e,
            None => {
                info!("Unload of '{}' skipped: not loaded", id);
                return false;
            }
        };

        if entry.enabled {
            entry.producer.on_disable();
        }
        entry.producer.cleanup();

        if let ProducerSource::Plugin { dir } = &entry.source {
            log::debug!("Releasing plugin package {}", dir.display());
        }

        self.order.retain(|o| o != id);
        self.bindings.retain(|b| b.owner != id);

        // entry drops here; for plugins that releases the library
        info!("Producer '{}' unloaded", id);
        true
    }

    /// Hot-reload: unload then load the same id. Returns true only if the
    /// reload fully succeeds; a failed reload leaves the producer absent.
    pub fn reload(&mut self, id: &str) -> bool {
        if !self.entries.contains_key(id) {
            return self.load(id);
        }
        if !matches!(
            self.entries.get(id).map(|e| &e.source),
            Some(ProducerSource::Plugin { .. })
        ) {
            warn!("Producer '{}' is built-in; reload is not applicable", id);
            return false;
        }
        self.unload(id);
        self.load(id)
    }

    /// Drop everything, plugins last-in-first-out
    pub fn unload_all(&mut self) {
        let ids: Vec<String> = self.order.iter().rev().cloned().collect();
        for id in ids {
            self.unload(&id);
        }
    }

    fn insert_entry(&mut self, id: String, entry: RegistryEntry) {
        for mode in &entry.modes {
            if let Some(existing) = self.bindings.iter_mut().find(|b| &b.mode == mode) {
                warn!(
                    "Mode '{}' already owned by '{}'; rebinding to '{}'",
                    mode, existing.owner, id
                );
                self.collisions.push(ModeCollision {
                    mode: mode.clone(),
                    previous_owner: existing.owner.clone(),
                    new_owner: id.clone(),
                });
                existing.owner = id.clone();
            } else {
                self.bindings.push(ModeBinding {
                    mode: mode.clone(),
                    owner: id.clone(),
                });
            }
        }
        self.order.push(id.clone());
        self.entries.insert(id, entry);
    }

    fn config_enabled(&self, id: &str) -> bool {
        self.producer_configs.get(id).map(|c| c.enabled).unwrap_or(true)
    }

    // ---- queries ------------------------------------------------------

    pub fn is_loaded(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// True for producers backed by a plugin package (reloadable)
    pub fn is_plugin(&self, id: &str) -> bool {
        matches!(
            self.entries.get(id).map(|e| &e.source),
            Some(ProducerSource::Plugin { .. })
        )
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries.get(id).map(|e| e.enabled).unwrap_or(false)
    }

    /// Producer ids in registration order
    pub fn producer_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Modes eligible for rotation: bindings whose owner is enabled, in
    /// registration order.
    pub fn available_modes(&self) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|b| self.is_enabled(&b.owner))
            .map(|b| b.mode.clone())
            .collect()
    }

    pub fn has_mode(&self, mode: &str) -> bool {
        self.owner_of(mode).is_some()
    }

    /// The producer id that currently owns a mode. Live modes are not in
    /// the bindings table; they resolve to the live producer declaring
    /// them.
    pub fn owner_of(&self, mode: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.mode == mode)
            .map(|b| b.owner.as_str())
            .or_else(|| self.live_owner_of(mode))
    }

    fn live_owner_of(&self, mode: &str) -> Option<&str> {
        self.order.iter().find_map(|id| {
            let entry = self.entries.get(id)?;
            let eligible = entry.enabled && entry.producer.has_live_priority();
            if eligible && entry.producer.live_modes().iter().any(|m| m == mode) {
                Some(id.as_str())
            } else {
                None
            }
        })
    }

    /// Collision history for diagnostics
    pub fn collisions(&self) -> &[ModeCollision] {
        &self.collisions
    }

    /// Dwell duration for a mode, asked of its owner. Re-queried on every
    /// tick so producers may answer dynamically.
    pub fn duration_of_mode(&self, mode: &str) -> Option<Duration> {
        let owner = self.owner_of(mode)?;
        self.entries.get(owner).map(|e| e.producer.display_duration())
    }

    /// Union of live modes across enabled live-priority producers that
    /// currently have live content, in registration order, deduplicated.
    pub fn live_modes_in_order(&self) -> Vec<String> {
        let mut live = Vec::new();
        for id in &self.order {
            let entry = match self.entries.get(id) {
                Some(e) if e.enabled => e,
                _ => continue,
            };
            if !entry.producer.has_live_priority() || !entry.producer.has_live_content() {
                continue;
            }
            for mode in entry.producer.live_modes() {
                if !live.contains(&mode) {
                    live.push(mode);
                }
            }
        }
        live
    }

    // ---- mutation -----------------------------------------------------

    /// Flip a producer's enabled flag, firing its enable/disable hooks on
    /// an actual transition.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                if entry.enabled != enabled {
                    entry.enabled = enabled;
                    if enabled {
                        entry.producer.on_enable();
                    } else {
                        entry.producer.on_disable();
                    }
                    info!(
                        "Producer '{}' {}",
                        id,
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Push a new config blob to a loaded producer
    pub fn apply_config_change(&mut self, id: &str, config: serde_yaml::Value) -> bool {
        if let Some(pc) = self.producer_configs.get_mut(id) {
            pc.config = config.clone();
        } else {
            self.producer_configs.insert(
                id.to_string(),
                ProducerConfig {
                    enabled: true,
                    config: config.clone(),
                },
            );
        }

        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.producer.on_config_change(&config);
                true
            }
            None => false,
        }
    }

    // ---- per-producer delegation -------------------------------------

    pub fn update(&mut self, id: &str) -> Result<(), ProducerError> {
        match self.entries.get_mut(id) {
            Some(entry) => entry.producer.update(),
            None => Err(ProducerError::Other(format!("producer '{}' not loaded", id))),
        }
    }

    /// Render a mode through its owning producer
    pub fn display(&mut self, mode: &str, force_clear: bool) -> Result<(), ProducerError> {
        let owner = self
            .owner_of(mode)
            .map(str::to_string)
            .ok_or_else(|| ProducerError::Render(format!("no producer owns mode '{}'", mode)))?;

        match self.entries.get_mut(&owner) {
            Some(entry) => entry.producer.display(mode, force_clear),
            None => Err(ProducerError::Other(format!("producer '{}' not loaded", owner))),
        }
    }

    pub fn is_animating(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .map(|e| e.producer.is_animating())
            .unwrap_or(false)
    }

    /// True when no enabled producer reports an animation in flight
    pub fn is_quiescent(&self) -> bool {
        self.entries
            .values()
            .filter(|e| e.enabled)
            .all(|e| !e.producer.is_animating())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::sink::MockSink;

    struct StubProducer {
        id: String,
        live: bool,
        live_modes: Vec<String>,
        valid: bool,
    }

    impl StubProducer {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                live: false,
                live_modes: Vec::new(),
                valid: true,
            }
        }
    }

    impl Producer for StubProducer {
        fn id(&self) -> &str {
            &self.id
        }
        fn update(&mut self) -> Result<(), ProducerError> {
            Ok(())
        }
        fn display(&mut self, _mode: &str, _force_clear: bool) -> Result<(), ProducerError> {
            Ok(())
        }
        fn display_duration(&self) -> Duration {
            Duration::from_secs(10)
        }
        fn has_live_priority(&self) -> bool {
            self.live
        }
        fn has_live_content(&self) -> bool {
            self.live
        }
        fn live_modes(&self) -> Vec<String> {
            self.live_modes.clone()
        }
        fn validate_config(&self) -> bool {
            self.valid
        }
    }

    fn test_registry() -> Registry {
        let sink: SharedSink = Arc::new(Mutex::new(MockSink::new(128, 64)));
        Registry::new(
            PathBuf::from("/nonexistent"),
            HashMap::new(),
            sink,
            SharedCache::new(),
        )
    }

    #[test]
    fn test_register_builtin_binds_modes_in_order() {
        let mut registry = test_registry();
        assert!(registry.register_builtin(
            Box::new(StubProducer::new("clock")),
            vec!["clock".to_string()],
        ));
        assert!(registry.register_builtin(
            Box::new(StubProducer::new("weather")),
            vec!["weather".to_string(), "forecast".to_string()],
        ));

        assert_eq!(
            registry.available_modes(),
            vec!["clock", "weather", "forecast"]
        );
        assert_eq!(registry.owner_of("forecast"), Some("weather"));
    }

    #[test]
    fn test_mode_collision_last_wins_and_is_recorded() {
        let mut registry = test_registry();
        registry.register_builtin(Box::new(StubProducer::new("a")), vec!["shared".to_string()]);
        registry.register_builtin(Box::new(StubProducer::new("b")), vec!["shared".to_string()]);

        assert_eq!(registry.owner_of("shared"), Some("b"));
        assert_eq!(registry.collisions().len(), 1);
        assert_eq!(registry.collisions()[0].previous_owner, "a");
        assert_eq!(registry.collisions()[0].new_owner, "b");
        // still exactly one binding for the mode
        assert_eq!(registry.available_modes(), vec!["shared"]);
    }

    #[test]
    fn test_unload_is_idempotent() {
        let mut registry = test_registry();
        registry.register_builtin(Box::new(StubProducer::new("clock")), vec!["clock".to_string()]);

        assert!(registry.unload("clock"));
        assert!(!registry.is_loaded("clock"));
        assert!(registry.available_modes().is_empty());

        // second unload is a no-op
        assert!(!registry.unload("clock"));
    }

    #[test]
    fn test_disabled_producer_excluded_from_rotation() {
        let mut registry = test_registry();
        registry.register_builtin(Box::new(StubProducer::new("clock")), vec!["clock".to_string()]);
        registry.register_builtin(Box::new(StubProducer::new("news")), vec!["news".to_string()]);

        registry.set_enabled("news", false);
        assert_eq!(registry.available_modes(), vec!["clock"]);

        registry.set_enabled("news", true);
        assert_eq!(registry.available_modes(), vec!["clock", "news"]);
    }

    #[test]
    fn test_live_modes_union_in_registration_order() {
        let mut registry = test_registry();

        let mut a = StubProducer::new("a");
        a.live = true;
        a.live_modes = vec!["a_live".to_string(), "both".to_string()];
        let mut b = StubProducer::new("b");
        b.live = true;
        b.live_modes = vec!["b_live".to_string(), "both".to_string()];

        registry.register_builtin(Box::new(a), vec!["a".to_string()]);
        registry.register_builtin(Box::new(b), vec!["b".to_string()]);

        assert_eq!(registry.live_modes_in_order(), vec!["a_live", "both", "b_live"]);
    }

    #[test]
    fn test_rejected_config_leaves_no_state() {
        let mut registry = test_registry();
        let mut p = StubProducer::new("bad");
        p.valid = false;

        assert!(!registry.register_builtin(Box::new(p), vec!["bad".to_string()]));
        assert!(!registry.is_loaded("bad"));
        assert!(registry.available_modes().is_empty());
    }

    #[test]
    fn test_load_missing_package_fails_cleanly() {
        let mut registry = test_registry();
        assert!(!registry.load("ghost"));
        assert!(!registry.is_loaded("ghost"));
    }
}
