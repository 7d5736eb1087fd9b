//! Configuration management for Tessera.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/tessera/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Challenge solver settings
    pub solver: SolverConfig,
    /// Remote classifier settings
    pub detector: DetectorConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TESSERA_HEADLESS`: Override browser headless mode (true/false)
    /// - `TESSERA_RETRY_LIMIT`: Override the solver retry limit
    /// - `TESSERA_CLICK_INTERVAL_MS`: Override the inter-click pacing delay
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides to an already-loaded config.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("TESSERA_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("TESSERA_RETRY_LIMIT") {
            if let Ok(limit) = val.parse() {
                self.solver.retry_limit = limit;
                tracing::debug!("Override solver.retry_limit from env: {}", limit);
            }
        }

        if let Ok(val) = std::env::var("TESSERA_CLICK_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                self.solver.click_interval_ms = Some(interval);
                tracing::debug!("Override solver.click_interval_ms from env: {}", interval);
            }
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/tessera/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("dev", "tessera", "tessera").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Challenge solver settings.
///
/// These are the only caller-configurable knobs of the resolution loop;
/// all other wait bounds are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of full-cycle retries before giving up
    pub retry_limit: u32,
    /// Optional pacing delay between tile clicks, in milliseconds
    pub click_interval_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            retry_limit: 15,
            click_interval_ms: None,
        }
    }
}

/// Remote classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Base URL of the classification service
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8700".to_string(),
            timeout_secs: 30,
        }
    }
}
