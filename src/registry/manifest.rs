/*
 *  registry/manifest.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Plugin package manifests - parsing, validation, discovery
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

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Manifest filename looked for in every plugin package directory
pub const MANIFEST_FILE: &str = "plugin.yaml";

/// Static descriptor of a plugin package, read at discovery time.
///
/// `entry_point` names the shared library inside the package directory and
/// `class_name` the registration symbol it exports. Missing required keys
/// fail the YAML parse and the package is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Unique producer id across the registry
    pub id: String,

    /// Shared-library filename inside the package directory
    pub entry_point: String,

    /// Exported registration symbol returning the producer vtable
    pub class_name: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Display modes this producer owns; defaults to `[id]`
    #[serde(default)]
    pub display_modes: Vec<String>,

    /// Shared libraries to preload before the entry point. Preload
    /// failures are logged and tolerated.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let s = fs::read_to_string(path)?;
        let manifest: Manifest = serde_yaml::from_str(&s)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Required fields must be present *and* non-empty; serde only
    /// enforces presence.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (field, value) in [
            ("id", &self.id),
            ("entry_point", &self.entry_point),
            ("class_name", &self.class_name),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::Manifest(format!(
                    "required field '{}' is empty",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Declared display modes, defaulting to the producer id itself
    pub fn modes(&self) -> Vec<String> {
        if self.display_modes.is_empty() {
            vec![self.id.clone()]
        } else {
            self.display_modes.clone()
        }
    }
}

/// A package found on disk with a valid manifest
#[derive(Debug, Clone)]
pub struct DiscoveredPackage {
    pub manifest: Manifest,
    pub dir: PathBuf,
}

/// Scan `root` for subdirectories containing a valid manifest.
///
/// Invalid manifests are logged and skipped; an id that mismatches its
/// directory name gets a warning only. No loaded state is touched.
pub fn discover_in(root: &Path) -> Vec<DiscoveredPackage> {
    let mut found = Vec::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Plugin root {} not readable: {}", root.display(), e);
            return found;
        }
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            continue;
        }

        match Manifest::from_file(&manifest_path) {
            Ok(manifest) => {
                let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if dir_name != manifest.id {
                    warn!(
                        "Plugin id '{}' does not match its directory name '{}'",
                        manifest.id, dir_name
                    );
                }
                debug!("Discovered plugin '{}' at {}", manifest.id, dir.display());
                found.push(DiscoveredPackage { manifest, dir });
            }
            Err(e) => {
                warn!("Skipping plugin package {}: {}", dir.display(), e);
            }
        }
    }

    // Deterministic discovery order regardless of readdir order
    found.sort_by(|a, b| a.manifest.id.cmp(&b.manifest.id));
    found
}
