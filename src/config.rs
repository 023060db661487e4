//! # Configuration Management
//!
//! This module handles loading the settings a store handle is built from.
//! Sources are layered, later ones winning:
//! - Built-in defaults
//! - An optional TOML file
//! - `FILEKV_*` environment variables (e.g. `FILEKV_PATH=/tmp/state.json`)
//!
//! ## Example Configuration File (filekv.toml)
//! ```toml
//! path = "data/db.json"
//! extension = "json"
//! pretty = true
//! sync = true
//! ```

use anyhow::Result;
use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one store handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the store file
    pub path: String,

    /// Extension the store file must carry, without the leading dot
    pub extension: String,

    /// Write indented JSON instead of a single line
    pub pretty: bool,

    /// Flush every write to disk before reporting success.
    /// Turning this off trades crash durability for speed.
    pub sync: bool,
}

impl Default for Config {
    /// Defaults suitable for a local script:
    /// - Store in "./data/db.json"
    /// - Require the "json" extension
    /// - Compact output, synced writes
    fn default() -> Self {
        Self {
            path: "./data/db.json".to_string(),
            extension: "json".to_string(),
            pretty: false,
            sync: true,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus the environment.
    ///
    /// # Arguments
    /// * `path` - Configuration file; a missing file is not an error
    ///
    /// # Returns
    /// * `Result<Config>` - Parsed configuration or error if a source is invalid
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env_prefix(path, "FILEKV")
    }

    fn load_with_env_prefix(path: &Path, prefix: &str) -> Result<Self> {
        let defaults = Config::default();
        let settings = ConfigLib::builder()
            .set_default("path", defaults.path)?
            .set_default("extension", defaults.extension)?
            .set_default("pretty", defaults.pretty)?
            .set_default("sync", defaults.sync)?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(prefix))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }
}
