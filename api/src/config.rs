//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use shared::config::{EnvOverrides, Settings, SettingsError};
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming the relay settings file.
pub const SETTINGS_VAR: &str = "RAVEN_SETTINGS";

/// Errors that can occur while loading the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `RAVEN_PORT` is not a port number.
    #[error("Invalid RAVEN_PORT: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),

    /// Host and port do not form a socket address.
    #[error("Invalid listen address: {0}")]
    InvalidAddress(#[from] AddrParseError),

    /// The settings file could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `RAVEN_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `RAVEN_PORT`: The port to listen on (default: 8080)
/// - `RAVEN_SETTINGS`: Path of the JSON relay settings (default: none)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Path of the relay settings file.
    pub settings_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `RAVEN_PORT` is set but is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("RAVEN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("RAVEN_PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()?
            .unwrap_or(8080);

        let settings_path = std::env::var(SETTINGS_VAR)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host,
            port,
            settings_path,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Loads the relay settings and applies the `SENTRY_*` overrides.
    ///
    /// Without a settings file the defaults apply, which leave delivery
    /// disabled unless `SENTRY_DSN` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be read or is invalid.
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let settings = match &self.settings_path {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        Ok(settings.with_overrides(&EnvOverrides::from_env()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            settings_path: None,
        }
    }
}
