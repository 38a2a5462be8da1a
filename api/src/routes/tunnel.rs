//! Envelope tunnel endpoint.
//!
//! Browser SDKs post envelopes here instead of to the collector. The body is
//! forwarded verbatim when its header names the configured public DSN.

use crate::scope::SharedScope;
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use shared::trace::SpanHandle;
use shared::tunnel::RelayResponse;

/// Content types a browser may send cross-origin without a preflight.
const CORS_SAFELISTED: [&str; 3] = [
    "application/x-www-form-urlencoded",
    "multipart/form-data",
    "text/plain",
];

/// Creates the tunnel routes.
pub fn tunnel_routes() -> Router<AppState> {
    Router::new().route("/raven/tunnel", post(tunnel))
}

/// Rejects a missing content type and the CORS-safelisted ones.
fn accepts_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .is_some_and(|mime| !mime.is_empty() && !CORS_SAFELISTED.contains(&mime.as_str()))
}

async fn tunnel(
    State(state): State<AppState>,
    scope: Option<Extension<SharedScope>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !accepts_content_type(&headers) {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }

    let tunnel = state.tunnel();
    let span = match (&scope, tunnel.endpoint()) {
        (Some(Extension(scope)), Some(endpoint)) => scope
            .lock()
            .map(|mut scope| scope.start_http_client_span("POST", &endpoint).span)
            .unwrap_or(SpanHandle::Noop),
        _ => SpanHandle::Noop,
    };

    let result = tunnel.relay(body).await;

    if let Some(Extension(scope)) = &scope {
        if let Ok(mut scope) = scope.lock() {
            let status = result.as_ref().ok().map(|r| r.status);
            if let Err(e) = scope.finish_http_client_span(span, status) {
                tracing::warn!(error = %e, "Failed to finish tunnel span");
            }
        }
    }

    match result {
        Ok(relayed) => relay_response(relayed),
        Err(e) => {
            tracing::debug!(error = %e, "Tunnel rejected envelope");
            StatusCode::from_u16(e.status())
                .unwrap_or(StatusCode::BAD_GATEWAY)
                .into_response()
        }
    }
}

fn relay_response(relayed: RelayResponse) -> Response {
    let mut builder = Response::builder().status(relayed.status);
    for (name, value) in &relayed.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(relayed.body)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Collector response could not be relayed");
        StatusCode::BAD_GATEWAY.into_response()
    })
}
