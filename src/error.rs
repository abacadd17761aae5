/*
 *  error.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Error types for the registry and producer subsystems
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

use thiserror::Error;

/// Errors raised while loading, unloading, or discovering producers.
///
/// A single producer failing to load must never take down the rest of the
/// registry, so these are logged at the call site and collapsed into a
/// `false` return from `load()`/`unload()`.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("plugin package not found for id '{0}'")]
    PackageNotFound(String),

    #[error("failed to load library {path}: {reason}")]
    LibraryLoad { path: String, reason: String },

    #[error("registration symbol '{0}' not found in plugin library")]
    SymbolNotFound(String),

    #[error("plugin ABI mismatch: plugin {plugin}, host {host}")]
    AbiMismatch { plugin: String, host: String },

    #[error("producer construction failed: {0}")]
    Construction(String),

    #[error("config validation rejected by producer '{0}'")]
    ConfigRejected(String),

    #[error("producer '{0}' is not loaded")]
    NotLoaded(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by a producer's own update/display work.
///
/// Caught per-call at the main loop boundary; never propagated across
/// producer boundaries.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("update failed: {0}")]
    Update(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("producer panicked: {0}")]
    Panic(String),

    #[error("{0}")]
    Other(String),
}
