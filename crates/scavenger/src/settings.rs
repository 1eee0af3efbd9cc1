//! Application Configuration
//!
//! Loaded from an optional TOML file, then `SCAVENGER__*` environment
//! variables (e.g. `SCAVENGER__DATABASE__PATH`).

use crate::error::AppError;
use config::{Config, Environment, File};
use geofence::DEFAULT_RADIUS_METERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file stem, resolved with any supported extension
const DEFAULT_CONFIG_NAME: &str = "scavenger";

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub fence: FenceSettings,
    pub logging: LoggingSettings,
}

/// Durable preference storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file
    pub path: PathBuf,
    /// Pool size; one connection serializes all commits
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("scavenger.db"),
            max_connections: 1,
        }
    }
}

/// Defaults applied to newly marked fences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FenceSettings {
    pub default_radius_meters: f32,
}

impl Default for FenceSettings {
    fn default() -> Self {
        Self {
            default_radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Settings {
    /// Load settings; an explicit `path` must exist, the default file may not
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let file = match path {
            Some(path) => File::with_name(&path.to_string_lossy()).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("SCAVENGER").separator("__"))
            .build()?
            .try_deserialize()?;

        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }
}
