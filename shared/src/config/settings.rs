//! Relay settings.
//!
//! Mirrors the stored plugin configuration. Every field has a default so a
//! partial JSON document (or none at all) yields a usable, disabled relay.

use super::overrides::EnvOverrides;
use super::proxy::ProxySettings;
use crate::dsn::{Dsn, DsnError};
use crate::models::{Level, LevelSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings document is not valid JSON for this schema.
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid settings: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Relay configuration.
///
/// # Example
///
/// ```
/// use shared::config::Settings;
///
/// let settings = Settings::from_json(r#"{"client_key": "https://key@sentry.test/1", "rate_limit": 10}"#).unwrap();
/// assert_eq!(settings.rate_limit, 10);
/// assert!(settings.dsn().unwrap().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// DSN used by the server side client.
    pub client_key: Option<String>,
    /// DSN that browser clients send to, and the only destination the
    /// tunnel forwards to.
    pub public_dsn: Option<String>,
    /// Environment name.
    pub environment: Option<String>,
    /// Release identifier.
    pub release: Option<String>,
    /// Maximum number of events per unit of work; 0 means unlimited.
    pub rate_limit: u64,
    /// Connect and total timeout in seconds for each delivery attempt.
    #[validate(range(min = 0.0))]
    pub timeout: Option<f64>,
    /// Gzip request bodies sent to the collector.
    pub http_compression: bool,
    /// Levels captured as error events.
    pub log_levels: LevelSet,
    /// Levels sent as structured log items.
    pub logs_log_levels: LevelSet,
    /// Channels never captured as error events.
    pub ignored_channels: Vec<String>,
    /// Message templates never captured as error events.
    pub ignored_messages: Vec<String>,
    /// Share of transactions to record; absent disables tracing.
    #[validate(range(min = 0.0, max = 1.0))]
    pub traces_sample_rate: Option<f64>,
    /// Hosts that receive trace propagation headers; absent means all hosts
    /// receive the trace header and none receive baggage.
    pub trace_propagation_targets_backend: Option<Vec<String>>,
    /// Attach a stack trace to log events.
    pub stack: bool,
    /// Keep function arguments in stack frames.
    pub trace: bool,
    /// Send the client IP address.
    pub capture_user_ip: bool,
    /// Send email and account name of the current user.
    pub send_user_data: bool,
    /// Start a transaction for every request.
    pub request_tracing: bool,
    /// Keep transactions of requests answered with 404.
    #[serde(rename = "404_tracing")]
    pub tracing_404: bool,
    /// Send structured log items from web requests.
    pub enable_logs: bool,
    /// Send structured log items from CLI commands.
    pub cli_enable_logs: bool,
    /// Start a transaction for every CLI command.
    pub cli_tracing: bool,
    /// Capture errors raised by CLI commands.
    pub cli_error_handler: bool,
    /// Monitor slug for cron check-ins.
    pub cron_monitor_id: Option<String>,
    /// Outbound proxy configuration.
    pub proxy: ProxySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_key: None,
            public_dsn: None,
            environment: None,
            release: None,
            rate_limit: 0,
            timeout: None,
            http_compression: false,
            log_levels: LevelSet::at_least(Level::Error),
            logs_log_levels: LevelSet::at_least(Level::Info),
            ignored_channels: Vec::new(),
            ignored_messages: Vec::new(),
            traces_sample_rate: None,
            trace_propagation_targets_backend: None,
            stack: false,
            trace: false,
            capture_user_ip: false,
            send_user_data: false,
            request_tracing: false,
            tracing_404: false,
            enable_logs: false,
            cli_enable_logs: false,
            cli_tracing: false,
            cli_error_handler: false,
            cron_monitor_id: None,
            proxy: ProxySettings::default(),
        }
    }
}

impl Settings {
    /// Parses and validates settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a value is out of
    /// range.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Applies deployment-time overrides, which win over stored values.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &EnvOverrides) -> Self {
        if let Some(dsn) = &overrides.dsn {
            self.client_key = Some(dsn.clone());
            self.public_dsn = Some(dsn.clone());
        }
        if let Some(environment) = &overrides.environment {
            self.environment = Some(environment.clone());
        }
        if let Some(release) = &overrides.release {
            self.release = Some(release.clone());
        }
        self
    }

    /// Parses the server side DSN. An empty or absent value is not an
    /// error; it disables delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if a DSN is configured but malformed.
    pub fn dsn(&self) -> Result<Option<Dsn>, DsnError> {
        parse_optional_dsn(self.client_key.as_deref())
    }

    /// Parses the public (tunnel) DSN.
    ///
    /// # Errors
    ///
    /// Returns an error if a DSN is configured but malformed.
    pub fn public_dsn(&self) -> Result<Option<Dsn>, DsnError> {
        parse_optional_dsn(self.public_dsn.as_deref())
    }

    /// Returns the delivery timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

fn parse_optional_dsn(value: Option<&str>) -> Result<Option<Dsn>, DsnError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.rate_limit, 0);
        assert!(settings.log_levels.contains(Level::Error));
        assert!(!settings.log_levels.contains(Level::Warning));
        assert!(settings.traces_sample_rate.is_none());
        assert!(settings.dsn().unwrap().is_none());
    }

    #[test]
    fn test_from_json_partial_document() {
        let settings = Settings::from_json(
            r#"{
                "client_key": "https://key@sentry.test/1",
                "404_tracing": true,
                "ignored_channels": ["cron"],
                "log_levels": {"warning": true}
            }"#,
        )
        .unwrap();

        assert!(settings.tracing_404);
        assert_eq!(settings.ignored_channels, vec!["cron".to_string()]);
        assert!(settings.log_levels.contains(Level::Warning));
        assert!(!settings.log_levels.contains(Level::Error));
        assert_eq!(settings.dsn().unwrap().unwrap().project_id(), "1");
    }

    #[test]
    fn test_sample_rate_out_of_range() {
        let result = Settings::from_json(r#"{"traces_sample_rate": 1.5}"#);
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let result = Settings::from_json(r#"{"timeout": -1.0}"#);
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Settings::from_json("{"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_malformed_dsn_is_reported() {
        let settings = Settings {
            client_key: Some("https://missing-key/1".to_string()),
            ..Settings::default()
        };
        assert!(settings.dsn().is_err());
    }

    #[test]
    fn test_empty_dsn_disables_delivery() {
        let settings = Settings {
            client_key: Some("  ".to_string()),
            ..Settings::default()
        };
        assert!(settings.dsn().unwrap().is_none());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let settings = Settings {
            client_key: Some("https://old@host/1".to_string()),
            environment: Some("stored".to_string()),
            ..Settings::default()
        };
        let overrides = EnvOverrides {
            dsn: Some("https://new@host/2".to_string()),
            environment: None,
            release: Some("1.2.3".to_string()),
        };

        let settings = settings.with_overrides(&overrides);
        assert_eq!(settings.client_key.as_deref(), Some("https://new@host/2"));
        assert_eq!(settings.public_dsn.as_deref(), Some("https://new@host/2"));
        assert_eq!(settings.environment.as_deref(), Some("stored"));
        assert_eq!(settings.release.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_timeout_duration() {
        let settings = Settings {
            timeout: Some(1.5),
            ..Settings::default()
        };
        assert_eq!(settings.timeout(), Some(Duration::from_millis(1500)));
    }
}
