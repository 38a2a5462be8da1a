//! In-memory transport.

use super::{OutboundRequest, Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// [`Transport`] that records requests instead of sending them.
///
/// Answers with queued responses in order, then with `200 {}`.
///
/// # Example
///
/// ```
/// use shared::transport::{OutboundRequest, RecordingTransport, Transport};
///
/// # tokio_test::block_on(async {
/// let transport = RecordingTransport::new();
/// transport.send(OutboundRequest::new("https://host/api/1/envelope/", "x")).await.unwrap();
/// assert_eq!(transport.requests().len(), 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    requests: Arc<RwLock<Vec<OutboundRequest>>>,
    responses: Arc<RwLock<VecDeque<Result<TransportResponse, TransportError>>>>,
}

impl RecordingTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next request.
    #[must_use]
    pub fn with_response(self, response: Result<TransportResponse, TransportError>) -> Self {
        if let Ok(mut responses) = self.responses.write() {
            responses.push_back(response);
        }
        self
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        if let Ok(mut requests) = self.requests.write() {
            requests.push(request);
        }
        self.responses
            .write()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Ok(TransportResponse::new(200, "{}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_responses_then_default() {
        let transport = RecordingTransport::new()
            .with_response(Ok(TransportResponse::new(429, "limited")))
            .with_response(Err(TransportError::Timeout));

        let first = transport.send(OutboundRequest::new("u", "1")).await;
        let second = transport.send(OutboundRequest::new("u", "2")).await;
        let third = transport.send(OutboundRequest::new("u", "3")).await;

        assert_eq!(first.unwrap().status, 429);
        assert_eq!(second, Err(TransportError::Timeout));
        assert_eq!(third.unwrap().status, 200);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_recordings() {
        let transport = RecordingTransport::new();
        let clone = transport.clone();
        clone.send(OutboundRequest::new("u", "x")).await.unwrap();
        assert_eq!(transport.requests()[0].body, "x");
    }
}
