//! Span and transaction data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from parsing trace or span identifiers.
#[derive(Debug, Error, PartialEq)]
pub enum IdParseError {
    /// The identifier has the wrong number of hex characters.
    #[error("Expected {expected} hex characters, found {found}")]
    InvalidLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// The identifier contains a non-hex character.
    #[error("Invalid hex identifier: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// All-zero identifiers are not valid.
    #[error("Identifier must not be all zeros")]
    Zero,
}

/// 128-bit trace identifier, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TraceId([u8; 16]);

impl TraceId {
    /// Generates a random trace id.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u128>().max(1).to_be_bytes())
    }

    /// Parses a 32 character hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not 32 hex characters or is all zeros.
    pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
        parse_hex::<16>(s).map(Self)
    }

    /// Returns the id as an integer.
    #[must_use]
    pub fn to_u128(self) -> u128 {
        u128::from_be_bytes(self.0)
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TraceId {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// 64-bit span identifier, rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SpanId([u8; 8]);

impl SpanId {
    /// Generates a random span id.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u64>().max(1).to_be_bytes())
    }

    /// Parses a 16 character hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not 16 hex characters or is all zeros.
    pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
        parse_hex::<8>(s).map(Self)
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<SpanId> for String {
    fn from(id: SpanId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SpanId {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

fn parse_hex<const N: usize>(s: &str) -> Result<[u8; N], IdParseError> {
    if s.len() != N * 2 {
        return Err(IdParseError::InvalidLength {
            expected: N * 2,
            found: s.len(),
        });
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(s, &mut bytes)?;
    if bytes.iter().all(|b| *b == 0) {
        return Err(IdParseError::Zero);
    }
    Ok(bytes)
}

/// Status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The span completed without error.
    #[default]
    Ok,
    /// The span encountered an error.
    Error,
    /// The span was cancelled.
    Cancelled,
}

impl SpanStatus {
    /// Derives a status from an HTTP response code.
    ///
    /// 499 (client closed request) counts as cancelled.
    #[must_use]
    pub fn from_http_status(code: u16) -> Self {
        match code {
            499 => Self::Cancelled,
            c if c < 400 => Self::Ok,
            _ => Self::Error,
        }
    }
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Where a transaction name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    /// Free-form name set in code.
    #[default]
    Custom,
    /// Raw request URL (high cardinality).
    Url,
    /// Parameterized route.
    Route,
    /// Background task or command.
    Task,
}

/// A node of a trace tree.
///
/// A span with no `parent_span_id` is the transaction (root) of its unit of
/// work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Trace this span belongs to.
    pub trace_id: TraceId,
    /// Id of this span.
    pub span_id: SpanId,
    /// Parent span (None for transactions started without a remote parent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    /// Operation, e.g. `http.server` or `db.sql.query`.
    pub op: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Instrumentation origin, e.g. `auto.http.client`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Start time.
    #[serde(rename = "start_timestamp")]
    pub start_time: DateTime<Utc>,
    /// End time, set when the span finishes.
    #[serde(rename = "timestamp", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Status.
    #[serde(default)]
    pub status: SpanStatus,
    /// Whether this span's trace is recorded.
    #[serde(skip)]
    pub sampled: bool,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Free-form data attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl Span {
    /// Creates a span started now.
    #[must_use]
    pub fn new(trace_id: TraceId, span_id: SpanId, op: impl Into<String>, sampled: bool) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            op: op.into(),
            description: None,
            origin: None,
            start_time: Utc::now(),
            end_time: None,
            status: SpanStatus::default(),
            sampled,
            tags: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    /// Sets the parent span.
    #[must_use]
    pub fn with_parent(mut self, parent: SpanId) -> Self {
        self.parent_span_id = Some(parent);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets a data attribute.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.data.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Returns true once the span has an end time.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Returns the span duration in milliseconds, if finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}
