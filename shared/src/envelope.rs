//! Envelope wire format.
//!
//! An envelope is a JSON header line followed by items, each an item header
//! line and a payload. Inbound envelopes from browsers are only inspected up
//! to the header line; outbound envelopes are assembled here.

use crate::dsn::Dsn;
use crate::models::{CheckIn, EventId, LogItem, TelemetryEvent};
use crate::trace::{DynamicSamplingContext, FinishedTransaction};
use bytes::Bytes;
use chrono::Utc;
use flate2::read::GzEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};
use std::io::Read;
use thiserror::Error;

/// Content type of envelope requests.
pub const CONTENT_TYPE: &str = "application/x-sentry-envelope";

/// Errors that can occur while reading or writing envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The header line is not JSON.
    #[error("Envelope header is not valid JSON: {0}")]
    InvalidHeader(serde_json::Error),

    /// The header line is JSON but not an object.
    #[error("Envelope header is not an object")]
    NotAnObject,

    /// The header has no string `dsn` field.
    #[error("Envelope header has no destination")]
    MissingDsn,

    /// A payload could not be serialized.
    #[error("Failed to serialize envelope item: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Compression failed.
    #[error("Failed to compress envelope: {0}")]
    Compression(#[from] std::io::Error),
}

/// Returns the header line of an envelope: everything up to the first
/// newline, or the whole body without one.
#[must_use]
pub fn header_line(body: &[u8]) -> &[u8] {
    body.split(|b| *b == b'\n').next().unwrap_or(body)
}

/// Extracts the destination from an inbound envelope.
///
/// # Example
///
/// ```
/// use shared::envelope::parse_destination;
///
/// let body = b"{\"dsn\":\"https://key@host/1\"}\n{\"type\":\"event\"}\n{}";
/// assert_eq!(parse_destination(body).unwrap(), "https://key@host/1");
/// ```
///
/// # Errors
///
/// Returns an error if the header line is not a JSON object with a string
/// `dsn` field.
pub fn parse_destination(body: &[u8]) -> Result<String, EnvelopeError> {
    let header: Value =
        serde_json::from_slice(header_line(body)).map_err(EnvelopeError::InvalidHeader)?;
    let Value::Object(header) = header else {
        return Err(EnvelopeError::NotAnObject);
    };
    match header.get("dsn") {
        Some(Value::String(dsn)) => Ok(dsn.clone()),
        _ => Err(EnvelopeError::MissingDsn),
    }
}

/// Gzips a request body.
///
/// # Errors
///
/// Returns an error if the encoder fails.
pub fn gzip(body: &[u8]) -> Result<Bytes, EnvelopeError> {
    let mut encoder = GzEncoder::new(body, Compression::default());
    let mut buffer = Vec::new();
    encoder.read_to_end(&mut buffer)?;
    Ok(Bytes::from(buffer))
}

/// Release and environment stamped onto outgoing payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Environment name.
    pub environment: Option<String>,
    /// Release identifier.
    pub release: Option<String>,
}

impl ReleaseInfo {
    fn stamp(&self, payload: &mut Map<String, Value>) {
        if let Some(environment) = &self.environment {
            payload.insert("environment".to_string(), json!(environment));
        }
        if let Some(release) = &self.release {
            payload.insert("release".to_string(), json!(release));
        }
    }
}

/// One item of an outbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeItem {
    header: Map<String, Value>,
    payload: Vec<u8>,
}

impl EnvelopeItem {
    fn new(kind: &str, payload: Vec<u8>) -> Self {
        let mut header = Map::new();
        header.insert("type".to_string(), json!(kind));
        header.insert("length".to_string(), json!(payload.len()));
        Self { header, payload }
    }

    /// Returns the item type.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.header.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    /// Returns the serialized payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Wraps an error event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub fn event(event: &TelemetryEvent, info: &ReleaseInfo) -> Result<Self, EnvelopeError> {
        let Value::Object(mut payload) = serde_json::to_value(event)? else {
            return Err(EnvelopeError::NotAnObject);
        };
        if let Some(trace) = payload.remove("trace") {
            payload.insert("contexts".to_string(), json!({ "trace": trace }));
        }
        if let Some(exception) = payload.remove("exception") {
            payload.insert("exception".to_string(), json!({ "values": [exception] }));
        }
        payload.insert("platform".to_string(), json!("other"));
        info.stamp(&mut payload);
        Ok(Self::new("event", serde_json::to_vec(&payload)?))
    }

    /// Wraps a finished transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a span cannot be serialized.
    pub fn transaction(
        transaction: &FinishedTransaction,
        event_id: EventId,
        info: &ReleaseInfo,
    ) -> Result<Self, EnvelopeError> {
        let root = &transaction.root;
        let mut payload = Map::new();
        payload.insert("type".to_string(), json!("transaction"));
        payload.insert("event_id".to_string(), json!(event_id));
        payload.insert("transaction".to_string(), json!(transaction.name));
        payload.insert(
            "transaction_info".to_string(),
            json!({ "source": transaction.source }),
        );
        payload.insert("start_timestamp".to_string(), json!(root.start_time));
        payload.insert("timestamp".to_string(), json!(root.end_time));
        payload.insert(
            "contexts".to_string(),
            json!({
                "trace": {
                    "trace_id": root.trace_id,
                    "span_id": root.span_id,
                    "parent_span_id": root.parent_span_id,
                    "op": root.op,
                    "status": root.status,
                    "origin": root.origin,
                    "data": root.data,
                }
            }),
        );
        payload.insert("spans".to_string(), serde_json::to_value(&transaction.spans)?);
        if !root.tags.is_empty() {
            payload.insert("tags".to_string(), json!(root.tags));
        }
        info.stamp(&mut payload);
        Ok(Self::new("transaction", serde_json::to_vec(&payload)?))
    }

    /// Wraps a batch of structured log items.
    ///
    /// # Errors
    ///
    /// Returns an error if an item cannot be serialized.
    pub fn logs(items: &[LogItem]) -> Result<Self, EnvelopeError> {
        let payload = serde_json::to_vec(&json!({ "items": items }))?;
        let mut item = Self::new("log", payload);
        item.header.insert("item_count".to_string(), json!(items.len()));
        item.header.insert(
            "content_type".to_string(),
            json!("application/vnd.sentry.items.log+json"),
        );
        Ok(item)
    }

    /// Wraps a cron check-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the check-in cannot be serialized.
    pub fn check_in(check_in: &CheckIn) -> Result<Self, EnvelopeError> {
        Ok(Self::new("check_in", serde_json::to_vec(check_in)?))
    }
}

/// An outbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    header: Map<String, Value>,
    items: Vec<EnvelopeItem>,
}

impl Envelope {
    /// Creates an empty envelope addressed to `dsn`.
    #[must_use]
    pub fn new(dsn: &Dsn) -> Self {
        let mut header = Map::new();
        header.insert("dsn".to_string(), json!(dsn.to_string()));
        Self {
            header,
            items: Vec::new(),
        }
    }

    /// Sets the event id of the envelope.
    #[must_use]
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.header.insert("event_id".to_string(), json!(event_id));
        self
    }

    /// Attaches the sampling context.
    #[must_use]
    pub fn with_trace(mut self, dsc: &DynamicSamplingContext) -> Self {
        if !dsc.entries().is_empty() {
            self.header.insert("trace".to_string(), json!(dsc.entries()));
        }
        self
    }

    /// Appends an item.
    pub fn add_item(&mut self, item: EnvelopeItem) {
        self.items.push(item);
    }

    /// Returns the items.
    #[must_use]
    pub fn items(&self) -> &[EnvelopeItem] {
        &self.items
    }

    /// Serializes the envelope, stamping `sent_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be serialized.
    pub fn to_bytes(&self) -> Result<Bytes, EnvelopeError> {
        let mut header = self.header.clone();
        header.insert("sent_at".to_string(), json!(Utc::now()));

        let mut out = serde_json::to_vec(&header)?;
        out.push(b'\n');
        for item in &self.items {
            serde_json::to_writer(&mut out, &item.header)?;
            out.push(b'\n');
            out.extend_from_slice(&item.payload);
            out.push(b'\n');
        }
        Ok(Bytes::from(out))
    }
}
