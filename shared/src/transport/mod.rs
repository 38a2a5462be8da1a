//! Delivery to the collector.
//!
//! The [`Transport`] trait is the only place bytes leave the process.
//! [`HttpTransport`] talks to a real collector; [`RecordingTransport`] keeps
//! requests in memory for tests and local development.

pub mod http;
pub mod recording;

pub use http::{HttpTransport, HttpTransportConfig};
pub use recording::RecordingTransport;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while delivering a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The client could not be configured.
    #[error("Invalid transport configuration: {0}")]
    Config(String),

    /// No response was received.
    #[error("Connection to collector failed: {0}")]
    Connect(String),

    /// The connect or total timeout elapsed.
    #[error("Request to collector timed out")]
    Timeout,

    /// The response body could not be read.
    #[error("Failed to read collector response: {0}")]
    Body(String),
}

/// A request to the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Full URL including query string.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Bytes,
}

impl OutboundRequest {
    /// Creates a POST request without headers.
    #[must_use]
    pub fn new(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the first value of a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The collector's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response without headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the collector.
///
/// Implementations must not retry; a failed delivery is reported once and
/// dropped by the caller.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// POSTs `request` and returns whatever the collector answered,
    /// including non-2xx responses.
    ///
    /// # Errors
    ///
    /// Returns an error only when no response was received.
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = OutboundRequest::new("https://host/api/1/envelope/", "x")
            .with_header("Content-Type", "application/x-sentry-envelope");
        assert_eq!(
            request.header("content-type"),
            Some("application/x-sentry-envelope")
        );
        assert!(request.header("content-encoding").is_none());
    }

    #[test]
    fn test_response_success_range() {
        assert!(TransportResponse::new(200, "").is_success());
        assert!(!TransportResponse::new(429, "").is_success());
        assert!(!TransportResponse::new(199, "").is_success());
    }
}
