//! Runtime configuration for the realtime core.
//!
//! Loaded once at startup from `{config_dir}/config.json`, then overlaid with
//! environment variables (a `.env` file is honoured via `dotenvy`). Every field
//! has a default so a missing file yields a working configuration.

use crate::error::config::ConfigError;
use crate::{DEFAULT_API_BASE_URL, DEFAULT_ENDPOINT};

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

pub const ENDPOINT_ENV_VAR: &str = "REALTIME_ENDPOINT";
pub const API_BASE_URL_ENV_VAR: &str = "REALTIME_API_BASE_URL";

const WEBSOCKET_SCHEMES: [&str; 2] = ["ws", "wss"];
const HTTP_SCHEMES: [&str; 2] = ["http", "https"];

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Hold time of each optimistic phase: routing, drafting, verifying.
    #[serde(default = "default_phase_delays_ms")]
    pub phase_delays_ms: [u64; 3],
    #[serde(default = "default_cleanup_grace_ms")]
    pub cleanup_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            phase_delays_ms: default_phase_delays_ms(),
            cleanup_grace_ms: default_cleanup_grace_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn phase_delays(&self) -> [Duration; 3] {
        self.phase_delays_ms.map(Duration::from_millis)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            connection: ConnectionConfig::default(),
            notifications: NotificationsConfig::default(),
            pipeline: PipelineConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_capacity() -> usize {
    50
}
fn default_phase_delays_ms() -> [u64; 3] {
    [800, 1500, 1000]
}
fn default_cleanup_grace_ms() -> u64 {
    2000
}
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl RealtimeConfig {
    /// Load config from `{config_dir}/config.json`, then apply environment overrides.
    ///
    /// # Returns
    ///
    /// Defaults (plus overrides) when the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or parsed, or
    /// if the resulting configuration fails validation.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(config_dir)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn load_file(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: RealtimeConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Overlay `REALTIME_ENDPOINT` / `REALTIME_API_BASE_URL` when set.
    ///
    /// A `.env` file in the working directory is loaded first; variables already
    /// present in the process environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        if let Ok(endpoint) = env::var(ENDPOINT_ENV_VAR) {
            info!("Endpoint overridden by {ENDPOINT_ENV_VAR}");
            self.connection.endpoint = endpoint;
        }

        if let Ok(base_url) = env::var(API_BASE_URL_ENV_VAR) {
            info!("API base URL overridden by {API_BASE_URL_ENV_VAR}");
            self.api.base_url = base_url;
        }
    }

    /// Save config to `{config_dir}/config.json` (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, serialization or any filesystem step fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(validation_error(format!(
                "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                self.version
            )));
        }

        check_url(&self.connection.endpoint, &WEBSOCKET_SCHEMES, "connection.endpoint")?;
        check_url(&self.api.base_url, &HTTP_SCHEMES, "api.base_url")?;

        if self.connection.max_reconnect_attempts == 0 {
            return Err(validation_error(
                "connection.max_reconnect_attempts must be at least 1".to_string(),
            ));
        }

        if self.notifications.capacity == 0 {
            return Err(validation_error(
                "notifications.capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[track_caller]
fn validation_error(reason: String) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason,
    }
}

#[track_caller]
fn check_url(value: &str, schemes: &[&str], field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| validation_error(format!("Invalid URL for {field}: {value} ({e})")))?;

    if !schemes.contains(&url.scheme()) {
        return Err(validation_error(format!(
            "Invalid scheme for {field}: {} (expected one of {schemes:?})",
            url.scheme()
        )));
    }

    Ok(())
}
