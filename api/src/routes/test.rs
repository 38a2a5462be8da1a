//! Test endpoints.
//!
//! Each endpoint sends one item through a fresh scope and answers with the
//! event id (null if nothing was delivered) and the client's debug messages.

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::debug_log::{DebugEntry, DebugLevel};
use shared::models::{LogLevel, Severity};

/// Response of the test endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct TestResponse {
    /// Id of the delivered envelope, null on any failure.
    pub id: Option<String>,
    /// Debug messages recorded while sending.
    pub log: Vec<DebugEntry>,
}

impl TestResponse {
    fn disabled() -> Self {
        Self {
            id: None,
            log: vec![DebugEntry {
                level: DebugLevel::Error,
                message: "Telemetry client is not configured".to_string(),
            }],
        }
    }
}

/// Creates the test routes.
pub fn test_routes() -> Router<AppState> {
    Router::new()
        .route("/raven/test", post(send_test_message))
        .route("/raven/test-logs", post(send_test_log))
}

/// Rejects requests that do not declare a JSON body.
fn require_json(headers: &HeaderMap) -> Result<(), StatusCode> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"));
    if is_json {
        Ok(())
    } else {
        Err(StatusCode::UNSUPPORTED_MEDIA_TYPE)
    }
}

/// Sends an info message to the collector.
async fn send_test_message(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TestResponse>, StatusCode> {
    require_json(&headers)?;
    let Some(client) = state.client() else {
        return Ok(Json(TestResponse::disabled()));
    };

    let mut scope = client.scope();
    let message = format!("Test message {}.", Utc::now().to_rfc2822());
    let id = scope.capture_message(&message, Severity::Info);
    let report = scope.drain().send(client).await;

    Ok(Json(TestResponse {
        id: report.is_delivered(id).then(|| id.to_string()),
        log: scope.debug_log().entries(),
    }))
}

/// Sends an info log item to the collector.
async fn send_test_log(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TestResponse>, StatusCode> {
    require_json(&headers)?;
    let Some(client) = state.client() else {
        return Ok(Json(TestResponse::disabled()));
    };

    let mut scope = client.scope();
    let message = format!("Test log {}.", Utc::now().to_rfc2822());
    let queued = scope.capture_log(LogLevel::Info, &message);
    let report = scope.drain().send(client).await;

    Ok(Json(TestResponse {
        id: report
            .delivered
            .first()
            .filter(|_| queued)
            .map(ToString::to_string),
        log: scope.debug_log().entries(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use shared::config::Settings;
    use shared::transport::{RecordingTransport, TransportError};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(settings: Settings, transport: &RecordingTransport) -> Router {
        test_routes().with_state(AppState::with_transport(
            settings,
            Arc::new(transport.clone()),
        ))
    }

    fn enabled() -> Settings {
        Settings {
            client_key: Some("https://key@sentry.test/1".to_string()),
            ..Settings::default()
        }
    }

    async fn post(app: Router, uri: &str, content_type: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let response = app
            .oneshot(request.body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[test]
    fn test_require_json() {
        let mut headers = HeaderMap::new();
        assert_eq!(require_json(&headers), Err(StatusCode::UNSUPPORTED_MEDIA_TYPE));
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert_eq!(require_json(&headers), Err(StatusCode::UNSUPPORTED_MEDIA_TYPE));
        headers.insert(header::CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert_eq!(require_json(&headers), Ok(()));
    }

    #[tokio::test]
    async fn test_message_is_sent() {
        let transport = RecordingTransport::new();
        let (status, body) = post(app(enabled(), &transport), "/raven/test", Some("application/json")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"].as_str().map(str::len), Some(32));
        assert!(body["log"].as_array().is_some_and(|log| !log.is_empty()));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_message_failure_returns_null_id() {
        let transport = RecordingTransport::new().with_response(Err(TransportError::Timeout));
        let (status, body) = post(app(enabled(), &transport), "/raven/test", Some("application/json")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["id"].is_null());
        assert!(body["log"]
            .as_array()
            .unwrap()
            .iter()
            .any(|entry| entry["level"] == "error"));
    }

    #[tokio::test]
    async fn test_requires_json_content_type() {
        let transport = RecordingTransport::new();
        let (status, _) = post(app(enabled(), &transport), "/raven/test", Some("text/plain")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let (status, _) = post(app(enabled(), &transport), "/raven/test-logs", None).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_logs_disabled_returns_null_id() {
        let transport = RecordingTransport::new();
        let (status, body) = post(app(enabled(), &transport), "/raven/test-logs", Some("application/json")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["id"].is_null());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_logs_are_sent() {
        let transport = RecordingTransport::new();
        let settings = Settings {
            enable_logs: true,
            ..enabled()
        };
        let (_, body) = post(app(settings, &transport), "/raven/test-logs", Some("application/json")).await;

        assert!(body["id"].is_string());
        let request = &transport.requests()[0];
        let text = std::str::from_utf8(&request.body).unwrap();
        assert!(text.contains("\"type\":\"log\""));
        assert!(text.contains("Test log "));
    }

    #[tokio::test]
    async fn test_disabled_client() {
        let transport = RecordingTransport::new();
        let (status, body) = post(app(Settings::default(), &transport), "/raven/test", Some("application/json")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["id"].is_null());
        assert_eq!(body["log"][0]["level"], "error");
    }
}
