//! Configuration loading and validation.
//!
//! Config is JSON5 with camelCase keys.
//! Config location: `~/.tasknest/tasknest.json`

mod auth;

pub use auth::{
    AuthConfig, AuthConfigBuilder, DEFAULT_PUBLIC_PATHS, DEFAULT_SESSION_MINUTES, HasherConfig,
    MAX_SESSION_MINUTES,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Falls back to defaults when no config file exists. Environment
    /// overrides are applied in both cases.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("tasknest.json")
    }

    /// Get the Tasknest state directory.
    ///
    /// Uses `TASKNEST_STATE_DIR` env var if set, otherwise `~/.tasknest`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("TASKNEST_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".tasknest")
        } else {
            PathBuf::from(".tasknest")
        }
    }

    /// Directory holding the sled database.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("TASKNEST_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(port) = std::env::var("TASKNEST_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        self.auth = self.auth.with_env_overrides();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.server.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Server timeout must be at least 1 second".to_string(),
            ));
        }

        self.auth.validate().map_err(ConfigError::Validation)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            cors: true,
            timeout_secs: default_timeout(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

const fn default_port() -> u16 {
    8000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_timeout() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Database directory. Defaults to `<state dir>/data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.auth.session_minutes, 30);
        assert!(!config.auth.gate_accepts_bearer);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");

        let mut config = Config::default();
        config.server.port = 9100;
        config.auth.gate_accepts_bearer = true;
        config.storage.data_dir = Some(temp.path().join("db"));

        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9100);
        assert!(loaded.auth.gate_accepts_bearer);
        assert_eq!(loaded.data_dir(), temp.path().join("db"));
    }

    #[test]
    fn test_json5_parsing() {
        let json5_content = r#"{
            // listen somewhere else
            server: {
                port: 8080,
                timeoutSecs: 5,
            },
            auth: {
                sessionMinutes: 45,
                gateAcceptsBearer: true,
            },
            settings: { logFormat: "json" },
        }"#;

        let config: Config = json5::from_str(json5_content).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.timeout_secs, 5);
        assert_eq!(config.auth.session_minutes, 45);
        assert!(config.auth.gate_accepts_bearer);
        assert_eq!(config.settings.log_format, LogFormat::Json);
        // Untouched sections keep their defaults
        assert!(config.auth.is_public_path("/login"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.session_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_dir() {
        let dir = Config::state_dir();
        assert!(dir.to_str().unwrap().contains("tasknest"));
    }
}
