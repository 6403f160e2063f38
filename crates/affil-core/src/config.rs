//! Configuration resolution for the affiliate engine.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.affil/settings.json)
//! 3. Project config (.affil/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority)
//!
//! Process-level knobs only. Program settings (commission rate, payout
//! minimum, attribution window) are data, stored in the
//! `affiliate_settings` table and fetched per operation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Engine-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database_path: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// Click tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Where the client-held attribution token file lives.
    pub token_path: Option<PathBuf>,
    /// Public origin used to build shareable referral links,
    /// e.g. `https://app.rentora.io`.
    pub public_origin: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            token_path: None,
            public_origin: "https://app.rentora.io".to_string(),
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    // Load project config
    if let Some(dir) = project_dir {
        let project_path = dir.join(".affil").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    // Apply environment overrides
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path: `~/.affil/settings.json`.
pub fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".affil").join("settings.json"))
}

/// Default database path: `~/.affil/affiliates.db`.
pub fn default_database_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".affil").join("affiliates.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.engine.database_path.is_some() {
        base.engine.database_path = overlay.engine.database_path;
    }
    base.engine.log_level = overlay.engine.log_level;
    base.engine.log_json = overlay.engine.log_json;

    if overlay.tracker.token_path.is_some() {
        base.tracker.token_path = overlay.tracker.token_path;
    }
    base.tracker.public_origin = overlay.tracker.public_origin;
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("AFFIL_DB_PATH") {
        config.engine.database_path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("AFFIL_LOG_LEVEL") {
        config.engine.log_level = val;
    }
    if let Ok(val) = std::env::var("AFFIL_ORIGIN") {
        config.tracker.public_origin = val;
    }
}
