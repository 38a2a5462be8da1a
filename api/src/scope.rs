//! Per-request telemetry scope.
//!
//! Every request gets its own [`Scope`]: a fresh rate limiter and trace
//! context, continued from the inbound trace headers. When request tracing
//! is enabled the request runs inside an `http.server` transaction named
//! after the matched route. After the
//! response is produced the scope is drained and sent on a spawned task.

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde_json::json;
use shared::client::Scope;
use shared::models::TransactionSource;
use shared::trace::{
    TraceState, TransactionContext, BAGGAGE_HEADER, SENTRY_TRACE_HEADER, TRACEPARENT_HEADER,
};
use std::sync::{Arc, Mutex};

/// The scope of the current request, available to handlers as an extension.
pub type SharedScope = Arc<Mutex<Scope>>;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Middleware that owns the request's scope.
pub async fn request_scope(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(client) = state.client().cloned() else {
        return next.run(request).await;
    };

    let mut scope = client.scope();
    let headers = request.headers();
    scope.continue_trace(
        header(headers, SENTRY_TRACE_HEADER),
        header(headers, TRACEPARENT_HEADER),
        header(headers, BAGGAGE_HEADER),
    );

    if client.settings().request_tracing {
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let (name, source) = match request.extensions().get::<MatchedPath>() {
            Some(route) => (route.as_str().to_string(), TransactionSource::Route),
            None => (path.clone(), TransactionSource::Url),
        };
        let ctx = TransactionContext::new(format!("{method} {name}"), "http.server")
            .with_source(source)
            .with_origin("auto.http.server");
        match scope.start_transaction(ctx) {
            Ok(root) => {
                if let Some(span) = scope.trace_mut().span_mut(root) {
                    span.data
                        .insert("http.request.method".to_string(), json!(method));
                    span.data.insert("url".to_string(), json!(path));
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to start request transaction"),
        }
    }

    let scope: SharedScope = Arc::new(Mutex::new(scope));
    request.extensions_mut().insert(Arc::clone(&scope));

    let response = next.run(request).await;
    let status = response.status().as_u16();

    let outbox = match scope.lock() {
        Ok(mut scope) => {
            if scope.trace().state() == TraceState::TransactionActive {
                scope.finish_server_transaction(status);
            }
            scope.drain()
        }
        Err(_) => {
            tracing::warn!("Request scope poisoned, telemetry discarded");
            return response;
        }
    };

    if !outbox.is_empty() {
        tokio::spawn(async move {
            let report = outbox.send(&client).await;
            tracing::debug!(
                delivered = report.delivered.len(),
                failed = report.failed.len(),
                "Request telemetry flushed"
            );
        });
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use shared::config::Settings;
    use shared::transport::{OutboundRequest, RecordingTransport};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(transport: &RecordingTransport) -> Router {
        let settings = Settings {
            client_key: Some("https://key@sentry.test/1".to_string()),
            request_tracing: true,
            traces_sample_rate: Some(1.0),
            ..Settings::default()
        };
        let state = AppState::with_transport(settings, Arc::new(transport.clone()));
        Router::new()
            .route("/items/{id}", get(|| async { "item" }))
            .layer(middleware::from_fn_with_state(state.clone(), request_scope))
            .with_state(state)
    }

    async fn first_request(transport: &RecordingTransport) -> OutboundRequest {
        for _ in 0..100 {
            if let Some(request) = transport.requests().into_iter().next() {
                return request;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no telemetry was flushed");
    }

    #[tokio::test]
    async fn test_transaction_named_after_route() {
        let transport = RecordingTransport::new();
        let response = app(&transport)
            .oneshot(
                Request::builder()
                    .uri("/items/42?full=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let request = first_request(&transport).await;
        let text = std::str::from_utf8(&request.body).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines[0]["trace"]["transaction"], "GET /items/{id}");
        let transaction = &lines[2];
        assert_eq!(transaction["transaction"], "GET /items/{id}");
        assert_eq!(transaction["transaction_info"]["source"], "route");
        assert_eq!(transaction["contexts"]["trace"]["data"]["url"], "/items/42");
    }
}
