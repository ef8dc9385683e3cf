//! Configuration management for lifeline.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "lifeline";

/// Default credential file name.
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `LIFELINE_`)
/// 2. TOML config file at `~/.config/lifeline/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shake detector tuning.
    pub detector: DetectorConfig,
    /// Backend alert service endpoints.
    pub backend: BackendConfig,
    /// Evidence blob storage endpoints.
    pub storage: StorageConfig,
    /// Credential persistence.
    pub credentials: CredentialsConfig,
    /// Dispatch pipeline timing.
    pub dispatch: DispatchConfig,
}

/// Shake detector tuning parameters.
///
/// Defaults are tuned empirically to reject hand tremor, walking, and single
/// bumps while remaining responsive to deliberate repeated shaking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Jerk magnitude a sample delta must exceed to count as a spike.
    pub threshold: f64,
    /// Rolling window in which spikes are counted, in milliseconds.
    pub window_ms: u64,
    /// Number of qualifying spikes within the window required to trigger.
    pub shakes_required: usize,
    /// Hard floor between triggers, in milliseconds.
    pub cooldown_ms: u64,
    /// Minimum elapsed time between processed samples, in milliseconds.
    pub min_sample_interval_ms: u64,
}

/// Backend alert service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the alert service API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Evidence blob storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL of the blob storage service.
    pub base_url: String,
    /// Bucket that receives evidence recordings.
    pub bucket: String,
}

/// Credential persistence configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Path to the credential file.
    /// Defaults to `~/.local/share/lifeline/credentials.json`
    pub path: Option<PathBuf>,
}

/// Dispatch pipeline timing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How long to wait for a location fix before treating it as absent,
    /// in milliseconds.
    pub location_wait_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 45.0,
            window_ms: 1000,
            shakes_required: 4,
            cooldown_ms: 10_000,
            min_sample_interval_ms: 100,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/storage".to_string(),
            bucket: "crime-recordings".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            location_wait_ms: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `LIFELINE_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("LIFELINE_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.detector.shakes_required == 0 {
            return Err(Error::ConfigValidation {
                message: "shakes_required must be greater than 0".to_string(),
            });
        }

        if self.detector.window_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "window_ms must be greater than 0".to_string(),
            });
        }

        if self.detector.min_sample_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "min_sample_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.detector.window_ms > self.detector.cooldown_ms {
            return Err(Error::ConfigValidation {
                message: format!(
                    "window_ms ({}) cannot be greater than cooldown_ms ({})",
                    self.detector.window_ms, self.detector.cooldown_ms
                ),
            });
        }

        if self.backend.base_url.is_empty() {
            return Err(Error::ConfigValidation {
                message: "backend.base_url must not be empty".to_string(),
            });
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.storage.base_url.is_empty() {
            return Err(Error::ConfigValidation {
                message: "storage.base_url must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the credential file path, resolving defaults if not set.
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(CREDENTIALS_FILE_NAME))
    }

    /// Get the per-request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    /// Get the location wait bound as a Duration.
    #[must_use]
    pub fn location_wait(&self) -> Duration {
        Duration::from_millis(self.dispatch.location_wait_ms)
    }
}
