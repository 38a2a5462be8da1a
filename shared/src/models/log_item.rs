//! Structured log items and cron check-ins.
//!
//! Log items travel on the lightweight logs path, which is configured
//! independently from error events.

use super::event::EventId;
use super::level::LogLevel;
use super::span::TraceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A structured log line.
///
/// # Example
///
/// ```
/// use shared::models::{LogItem, LogLevel, TraceId};
///
/// let item = LogItem::new(LogLevel::Info, "cache rebuilt", TraceId::random())
///     .with_attribute("channel", "cron");
/// assert_eq!(item.attributes["channel"], serde_json::json!("cron"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogItem {
    /// When the line was logged.
    #[serde(with = "epoch_seconds")]
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// The formatted message.
    pub body: String,
    /// Trace the line belongs to.
    pub trace_id: TraceId,
    /// Attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl LogItem {
    /// Creates a log item timestamped now.
    #[must_use]
    pub fn new(level: LogLevel, body: impl Into<String>, trace_id: TraceId) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            body: body.into(),
            trace_id,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }
}

/// State of a monitored cron run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    /// The run started.
    InProgress,
    /// The run finished successfully.
    Ok,
    /// The run failed.
    Error,
}

/// A cron monitor check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    /// Check-in id; the closing check-in reuses the opening one's id.
    pub check_in_id: EventId,
    /// Monitor slug.
    pub monitor_slug: String,
    /// Run status.
    pub status: CheckInStatus,
    /// Duration in seconds so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Release.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// Environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl CheckIn {
    /// Opens a check-in for `monitor_slug`.
    #[must_use]
    pub fn in_progress(monitor_slug: impl Into<String>) -> Self {
        Self {
            check_in_id: EventId::new(),
            monitor_slug: monitor_slug.into(),
            status: CheckInStatus::InProgress,
            duration: None,
            release: None,
            environment: None,
        }
    }

    /// Returns the closing check-in for this run.
    #[must_use]
    pub fn close(&self, status: CheckInStatus, duration: f64) -> Self {
        Self {
            status,
            duration: Some(duration),
            ..self.clone()
        }
    }
}

/// Timestamps as fractional seconds since the epoch.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_precision_loss)]
    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(ts.timestamp_micros() as f64 / 1_000_000.0)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64)
            .ok_or_else(|| D::Error::custom("timestamp out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_item_serialization() {
        let trace_id = TraceId::random();
        let item = LogItem::new(LogLevel::Warn, "slow query", trace_id)
            .with_attribute("user.id", 7);
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["level"], "warn");
        assert_eq!(json["body"], "slow query");
        assert_eq!(json["trace_id"], trace_id.to_string());
        assert_eq!(json["attributes"]["user.id"], 7);
        let seconds = json["timestamp"].as_f64().unwrap();
        assert!((seconds - item.timestamp.timestamp() as f64).abs() < 1.0);

        let back: LogItem = serde_json::from_value(json).unwrap();
        assert_eq!(back.timestamp.timestamp(), item.timestamp.timestamp());
    }

    #[test]
    fn test_check_in_close_keeps_id() {
        let open = CheckIn::in_progress("nightly-cron");
        let closed = open.close(CheckInStatus::Ok, 1.5);

        assert_eq!(open.check_in_id, closed.check_in_id);
        assert_eq!(closed.status, CheckInStatus::Ok);
        assert_eq!(closed.duration, Some(1.5));

        let json = serde_json::to_value(&open).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert!(json.get("duration").is_none());
    }
}
