//! Telemetry event data model.
//!
//! A [`TelemetryEvent`] is one observation to send to the collector. It is
//! produced by the event builder and not modified afterwards.

use super::level::{Level, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of a captured event, 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(#[serde(with = "uuid::serde::simple")] Uuid);

impl EventId {
    /// Generates a random event id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// The user an event is attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// User identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Email address, only sent when user data sharing is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Account name, only sent when user data sharing is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Client IP address, only sent when IP capture is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl UserContext {
    /// Returns true when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.email.is_none()
            && self.username.is_none()
            && self.ip_address.is_none()
    }
}

/// A single stack frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Source file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Line number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    /// Function name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Local variables or call arguments. Stripped unless explicitly enabled.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, serde_json::Value>,
}

impl StackFrame {
    /// Creates a frame without variables.
    #[must_use]
    pub fn new(filename: impl Into<String>, lineno: u32, function: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            lineno: Some(lineno),
            function: Some(function.into()),
            vars: BTreeMap::new(),
        }
    }

    /// Attaches a variable to the frame.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.vars.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }
}

/// Stack trace wrapper as the collector expects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stacktrace {
    /// Frames, oldest call first.
    pub frames: Vec<StackFrame>,
}

/// How an exception reached the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mechanism {
    /// Mechanism type, `generic` for everything reported through the logger.
    #[serde(rename = "type")]
    pub kind: String,
    /// False when the exception crashed a top-level handler.
    pub handled: bool,
}

impl Mechanism {
    /// Mechanism for an exception that was not handled by the application.
    #[must_use]
    pub fn unhandled() -> Self {
        Self {
            kind: "generic".to_string(),
            handled: false,
        }
    }
}

/// An exception bound to a log record, as supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Exception type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Exception message.
    pub value: String,
    /// HTTP status for HTTP-style exceptions that the framework raises on
    /// purpose (not found, access denied and so on).
    #[serde(skip)]
    pub http_status: Option<u16>,
    /// Frames of the exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
    /// Set by the builder when the exception is classified as unhandled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
}

impl ExceptionInfo {
    /// Creates an exception without frames.
    #[must_use]
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
            http_status: None,
            stacktrace: None,
            mechanism: None,
        }
    }

    /// Marks the exception as an HTTP exception with the given status.
    #[must_use]
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Attaches frames to the exception.
    #[must_use]
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.stacktrace = Some(Stacktrace { frames });
        self
    }
}

/// The message of an event in its three forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    /// The unformatted template.
    #[serde(rename = "message")]
    pub template: String,
    /// Placeholder values keyed by placeholder (including the sigil).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// The template with placeholders substituted.
    pub formatted: String,
}

/// Trace identifiers attached to an event captured inside a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTraceContext {
    /// Trace id.
    pub trace_id: String,
    /// Span id that was current when the event was captured.
    pub span_id: String,
}

/// Request data attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// Request URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Submitted form data.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

/// One observation to send to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Unique event id.
    pub event_id: EventId,
    /// When the observation happened.
    pub timestamp: DateTime<Utc>,
    /// Normalized level.
    #[serde(skip)]
    pub level: Level,
    /// Collector severity derived from `level`.
    #[serde(rename = "level")]
    pub severity: Severity,
    /// Logger channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Message template, placeholders and resolved text.
    pub message: EventMessage,
    /// The user context.
    #[serde(skip_serializing_if = "UserContext::is_empty")]
    pub user: UserContext,
    /// Extra key-value attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Stack trace of the logging call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
    /// Bound exception.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    /// Request the event was logged in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestInfo>,
    /// Trace identifiers, filled in at capture time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<EventTraceContext>,
}

impl TelemetryEvent {
    /// Creates a plain message event, the way `capture_message` does.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::models::{Level, TelemetryEvent};
    ///
    /// let event = TelemetryEvent::message(Level::Warning, "Disk almost full");
    /// assert_eq!(event.message.formatted, "Disk almost full");
    /// ```
    #[must_use]
    pub fn message(level: Level, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            level,
            severity: level.severity(),
            logger: None,
            message: EventMessage {
                template: text.clone(),
                params: BTreeMap::new(),
                formatted: text,
            },
            user: UserContext::default(),
            extra: BTreeMap::new(),
            tags: BTreeMap::new(),
            stacktrace: None,
            exception: None,
            request: None,
            trace: None,
        }
    }

    /// Overrides the collector severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attaches an exception.
    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Returns a copy carrying the given trace identifiers.
    #[must_use]
    pub fn with_trace(mut self, trace: Option<EventTraceContext>) -> Self {
        self.trace = trace;
        self
    }

    /// Returns true if the bound exception is flagged as unhandled.
    #[must_use]
    pub fn is_unhandled(&self) -> bool {
        self.exception
            .as_ref()
            .and_then(|e| e.mechanism.as_ref())
            .is_some_and(|m| !m.handled)
    }
}
