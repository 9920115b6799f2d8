//! Webhook ingress endpoint, POST /.
//!
//! Accepts any JSON body, records it, pushes it to live viewers and echoes
//! it back. No authentication: every sender is accepted.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap, Method, StatusCode},
    Json,
};
use hookwatch_core::error::HookwatchError;
use hookwatch_core::types::Headers;
use hookwatch_history::InboundRequest;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::app::AppState;

// ── Public handler ────────────────────────────────────────────────────────────

/// POST /
///
/// Returns 200 + the payload on success, 400 on a non-JSON body, 500 on any
/// other failure. Bodies over `server.max_body_bytes` never reach here (413).
pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    SourceIp(source_ip): SourceIp,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request = InboundRequest {
        method: method.as_str(),
        headers: headers_to_json(&headers),
        content_type: headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        remote_addr: source_ip,
        body: &body,
    };

    state
        .ingestor
        .ingest(request)
        .map(Json)
        .map_err(|e| error_response(&e))
}

// ── Extractors ────────────────────────────────────────────────────────────────

/// Peer IP of the connection, when the server was started with connect info.
pub struct SourceIp(pub Option<String>);

impl<S> FromRequestParts<S> for SourceIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ip = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(SourceIp(ip))
    }
}

// ── Header conversion ─────────────────────────────────────────────────────────

/// Flatten a header map into a JSON object, keeping map order.
///
/// Repeated header names are combined into one comma-separated value; values
/// that are not valid UTF-8 are decoded lossily.
pub fn headers_to_json(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for name in headers.keys() {
        let combined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        out.insert(name.as_str().to_string(), Value::String(combined));
    }
    out
}

// ── Error helpers ─────────────────────────────────────────────────────────────

fn error_response(err: &HookwatchError) -> (StatusCode, Json<Value>) {
    if err.is_client_error() {
        warn!(reason = %err, "rejected webhook with non-JSON body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Request must be JSON"})),
        )
    } else {
        error!(code = err.code(), error = %err, "error processing webhook");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error"})),
        )
    }
}
