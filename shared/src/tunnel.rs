//! Relay of browser envelopes to the collector.
//!
//! Browsers post envelopes to the application instead of the collector so
//! that ad blockers and CSP rules do not interfere. The tunnel only forwards
//! envelopes addressed to the configured public DSN.

use crate::dsn::Dsn;
use crate::envelope::{self, CONTENT_TYPE};
use crate::transport::{OutboundRequest, Transport, TransportError};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Response headers that must not be relayed back to the browser.
pub const STRIPPED_HEADERS: [&str; 2] = ["alt-svc", "transfer-encoding"];

/// Errors that can occur while relaying an envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// No public DSN is configured.
    #[error("No public DSN configured")]
    MissingDestination,

    /// The envelope is malformed or addressed elsewhere.
    #[error("Bad envelope: {0}")]
    BadRequest(String),

    /// The collector could not be reached.
    #[error("Collector unreachable: {0}")]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// HTTP status the API answers with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingDestination => 500,
            Self::BadRequest(_) => 400,
            Self::Transport(_) => 502,
        }
    }
}

/// The collector's response as relayed to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    /// Upstream status code.
    pub status: u16,
    /// Upstream headers minus [`STRIPPED_HEADERS`].
    pub headers: Vec<(String, String)>,
    /// Upstream body.
    pub body: Bytes,
}

/// Forwards envelopes to the configured public DSN.
#[derive(Debug, Clone)]
pub struct Tunnel {
    destination: Option<Dsn>,
    transport: Arc<dyn Transport>,
    compression: bool,
}

impl Tunnel {
    /// Creates a tunnel; `destination` is the public DSN.
    #[must_use]
    pub fn new(destination: Option<Dsn>, transport: Arc<dyn Transport>, compression: bool) -> Self {
        Self {
            destination,
            transport,
            compression,
        }
    }

    /// Returns the collector endpoint envelopes are forwarded to.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.destination.as_ref().map(Dsn::envelope_endpoint)
    }

    /// Validates `body` and forwards it verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingDestination`] without a public DSN,
    /// [`RelayError::BadRequest`] when the header line is malformed or names
    /// another DSN, and [`RelayError::Transport`] when no response arrives.
    pub async fn relay(&self, body: Bytes) -> Result<RelayResponse, RelayError> {
        let destination = self
            .destination
            .as_ref()
            .ok_or(RelayError::MissingDestination)?;

        let claimed = envelope::parse_destination(&body)
            .map_err(|e| RelayError::BadRequest(e.to_string()))?;
        let claimed: Dsn = claimed
            .parse()
            .map_err(|e: crate::dsn::DsnError| RelayError::BadRequest(e.to_string()))?;

        if !constant_time_eq(
            claimed.to_string().as_bytes(),
            destination.to_string().as_bytes(),
        ) {
            tracing::warn!("Rejected envelope addressed to a foreign DSN");
            return Err(RelayError::BadRequest("DSN mismatch".to_string()));
        }

        let url = format!(
            "{}?sentry_key={}",
            destination.envelope_endpoint(),
            destination.public_key()
        );
        let mut request = if self.compression {
            let compressed = envelope::gzip(&body)
                .map_err(|e| RelayError::BadRequest(e.to_string()))?;
            OutboundRequest::new(url, compressed).with_header("Content-Encoding", "gzip")
        } else {
            OutboundRequest::new(url, body)
        };
        request = request.with_header("Content-Type", CONTENT_TYPE);

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(error = %e, "Envelope relay failed");
            RelayError::Transport(e)
        })?;

        tracing::debug!(status = response.status, "Envelope relayed");
        Ok(RelayResponse {
            status: response.status,
            headers: response
                .headers
                .into_iter()
                .filter(|(name, _)| {
                    !STRIPPED_HEADERS
                        .iter()
                        .any(|stripped| name.eq_ignore_ascii_case(stripped))
                })
                .collect(),
            body: response.body,
        })
    }
}

/// Compares two byte strings without short-circuiting on content.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
