/*
 *  registry/loader.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Plugin loader - resolves packages on disk and loads their libraries
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

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::{debug, info, warn};

use super::ffi::{
    extract_string, ProducerRegisterFn, PixmuxProducerVTable,
    PIXMUX_PLUGIN_ABI_VERSION_MAJOR, PIXMUX_PLUGIN_ABI_VERSION_MINOR,
    PIXMUX_PLUGIN_ABI_VERSION_PATCH, PIXMUX_PLUGIN_NAME_SIZE, PIXMUX_PLUGIN_VERSION_SIZE,
};
use super::manifest::{Manifest, MANIFEST_FILE};
use crate::error::RegistryError;

/// Plugin metadata reported by the plugin itself (the manifest is what
/// the package *claims*; this is what the library *says*)
#[derive(Debug, Clone)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub abi_version: (u32, u32, u32),
}

/// A loaded plugin: the library, the libraries it asked us to preload,
/// and its vtable. Libraries must outlive every vtable call.
pub struct LoadedPlugin {
    #[allow(dead_code)]
    library: Library,

    /// Preloaded `requires` libraries, kept alive for the plugin's sake
    #[allow(dead_code)]
    preloaded: Vec<Library>,

    vtable: &'static PixmuxProducerVTable,

    metadata: PluginMetadata,
}

impl LoadedPlugin {
    pub fn vtable(&self) -> &'static PixmuxProducerVTable {
        self.vtable
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }
}

/// Resolve the on-disk package directory for a producer id.
///
/// Tries `root/<id>` first, then the configured naming fallback
/// `root/<prefix><id>` for packages whose directory carries a vendor
/// prefix the id does not.
pub fn resolve_package_dir(root: &Path, id: &str, prefix: &str) -> Option<PathBuf> {
    let direct = root.join(id);
    if direct.join(MANIFEST_FILE).exists() {
        return Some(direct);
    }

    if !prefix.is_empty() {
        let prefixed = root.join(format!("{}{}", prefix, id));
        if prefixed.join(MANIFEST_FILE).exists() {
            debug!("Resolved '{}' via prefix fallback: {}", id, prefixed.display());
            return Some(prefixed);
        }
    }

    None
}

/// Shared-library filename candidates for an entry point.
///
/// The manifest's `entry_point` is tried verbatim first; when it has no
/// platform extension the conventional `lib<name>.<ext>` spellings are
/// tried as well.
pub fn entry_point_candidates(entry_point: &str) -> Vec<String> {
    let mut names = vec![entry_point.to_string()];

    if !entry_point.contains('.') {
        #[cfg(target_os = "linux")]
        {
            names.push(format!("lib{}.so", entry_point));
            names.push(format!("{}.so", entry_point));
        }

        #[cfg(target_os = "macos")]
        {
            names.push(format!("lib{}.dylib", entry_point));
            names.push(format!("{}.dylib", entry_point));
        }

        #[cfg(target_os = "windows")]
        {
            names.push(format!("{}.dll", entry_point));
        }
    }

    names
}

/// Preload the manifest's `requires` libraries.
///
/// Failures are logged and tolerated: a producer with unmet dependencies
/// may still partially function, which beats blocking the whole system.
fn preload_requires(dir: &Path, manifest: &Manifest) -> Vec<Library> {
    let mut preloaded = Vec::new();

    for name in &manifest.requires {
        // package-local first, then the system loader path
        let local = dir.join(name);
        let result = unsafe {
            if local.exists() {
                Library::new(&local)
            } else {
                Library::new(name)
            }
        };

        match result {
            Ok(lib) => {
                debug!("Preloaded dependency '{}' for '{}'", name, manifest.id);
                preloaded.push(lib);
            }
            Err(e) => {
                warn!(
                    "Dependency '{}' for '{}' failed to load ({}); continuing without it",
                    name, manifest.id, e
                );
            }
        }
    }

    preloaded
}

/// Load a plugin library from its package directory.
///
/// Steps: preload declared dependencies, load the entry-point library,
/// look up the registration symbol named by the manifest, fetch the
/// vtable, verify ABI compatibility, and extract plugin metadata.
pub fn load_plugin(dir: &Path, manifest: &Manifest) -> Result<LoadedPlugin, RegistryError> {
    let preloaded = preload_requires(dir, manifest);

    let mut library = None;
    let mut last_error = String::new();
    for candidate in entry_point_candidates(&manifest.entry_point) {
        let path = dir.join(&candidate);
        if !path.exists() {
            continue;
        }
        match unsafe { Library::new(&path) } {
            Ok(lib) => {
                info!("Loading plugin library {}", path.display());
                library = Some(lib);
                break;
            }
            Err(e) => {
                last_error = e.to_string();
            }
        }
    }

    let library = library.ok_or_else(|| RegistryError::LibraryLoad {
        path: dir.join(&manifest.entry_point).display().to_string(),
        reason: if last_error.is_empty() {
            "file not found".to_string()
        } else {
            last_error
        },
    })?;

    let mut symbol_name = manifest.class_name.clone().into_bytes();
    symbol_name.push(0);

    let register_fn: Symbol<ProducerRegisterFn> = unsafe {
        library
            .get(&symbol_name)
            .map_err(|_| RegistryError::SymbolNotFound(manifest.class_name.clone()))?
    };

    let vtable_ptr = register_fn();
    if vtable_ptr.is_null() {
        return Err(RegistryError::Construction(
            "plugin registration returned null vtable".to_string(),
        ));
    }

    let vtable: &'static PixmuxProducerVTable = unsafe { &*vtable_ptr };

    // Verify ABI version
    let mut major = 0u32;
    let mut minor = 0u32;
    let mut patch = 0u32;
    (vtable.abi_version)(&mut major, &mut minor, &mut patch);

    debug!(
        "Plugin ABI {}.{}.{}, host ABI {}.{}.{}",
        major, minor, patch,
        PIXMUX_PLUGIN_ABI_VERSION_MAJOR,
        PIXMUX_PLUGIN_ABI_VERSION_MINOR,
        PIXMUX_PLUGIN_ABI_VERSION_PATCH,
    );

    if major != PIXMUX_PLUGIN_ABI_VERSION_MAJOR {
        return Err(RegistryError::AbiMismatch {
            plugin: format!("{}.{}.{}", major, minor, patch),
            host: format!(
                "{}.{}.{}",
                PIXMUX_PLUGIN_ABI_VERSION_MAJOR,
                PIXMUX_PLUGIN_ABI_VERSION_MINOR,
                PIXMUX_PLUGIN_ABI_VERSION_PATCH
            ),
        });
    }

    if minor > PIXMUX_PLUGIN_ABI_VERSION_MINOR {
        warn!(
            "Plugin '{}' has newer minor ABI {}.{}.{} than host - may expose extra features",
            manifest.id, major, minor, patch
        );
    }

    // Extract plugin metadata
    let mut name_buf = vec![0 as std::ffi::c_char; PIXMUX_PLUGIN_NAME_SIZE];
    let mut version_buf = vec![0 as std::ffi::c_char; PIXMUX_PLUGIN_VERSION_SIZE];
    (vtable.plugin_info)(name_buf.as_mut_ptr(), version_buf.as_mut_ptr());

    let name = extract_string(&name_buf);
    let version = extract_string(&version_buf);

    info!("Loaded plugin: {} v{} ({})", name, version, manifest.id);

    Ok(LoadedPlugin {
        library,
        preloaded,
        vtable,
        metadata: PluginMetadata {
            name,
            version,
            abi_version: (major, minor, patch),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_candidates_verbatim_first() {
        let names = entry_point_candidates("libmarquee.so");
        assert_eq!(names, vec!["libmarquee.so".to_string()]);
    }

    #[test]
    fn test_entry_point_candidates_bare_name() {
        let names = entry_point_candidates("marquee");
        assert_eq!(names[0], "marquee");

        #[cfg(target_os = "linux")]
        assert!(names.contains(&"libmarquee.so".to_string()));
    }

    #[test]
    fn test_resolve_package_dir_prefix_fallback() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("pixmux-plugin-scores");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILE),
            "id: scores\nentry_point: libscores.so\nclass_name: reg\n",
        )
        .unwrap();

        assert!(resolve_package_dir(root.path(), "scores", "").is_none());
        let resolved = resolve_package_dir(root.path(), "scores", "pixmux-plugin-").unwrap();
        assert_eq!(resolved, dir);
    }
}
