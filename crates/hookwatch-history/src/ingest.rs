//! Ingestion: raw request → validated record → history + broadcast.

use std::io::{self, Write};
use std::sync::Arc;

use hookwatch_core::config::IngestConfig;
use hookwatch_core::error::{HookwatchError, Result};
use hookwatch_core::types::{Headers, WebhookRecord};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::hub::SubscriptionHub;

/// Transport-neutral view of one inbound webhook request.
#[derive(Debug)]
pub struct InboundRequest<'a> {
    pub method: &'a str,
    pub headers: Headers,
    pub content_type: Option<&'a str>,
    pub remote_addr: Option<String>,
    pub body: &'a [u8],
}

/// Validates requests, commits them through the hub and echoes payloads.
pub struct Ingestor {
    hub: Arc<SubscriptionHub>,
    options: IngestConfig,
}

impl Ingestor {
    pub fn new(hub: Arc<SubscriptionHub>, options: IngestConfig) -> Self {
        Self { hub, options }
    }

    pub fn hub(&self) -> &Arc<SubscriptionHub> {
        &self.hub
    }

    /// Record one webhook and return its decoded payload for the response.
    ///
    /// A body that is not JSON yields `MalformedPayload` and leaves the
    /// history and the viewers untouched.
    pub fn ingest(&self, request: InboundRequest<'_>) -> Result<Value> {
        if self.options.require_json_content_type && !is_json_content_type(request.content_type)
        {
            debug!(content_type = ?request.content_type, "rejecting non-JSON content type");
            return Err(HookwatchError::MalformedPayload(format!(
                "content type {:?} is not JSON",
                request.content_type.unwrap_or("")
            )));
        }

        let payload: Value = serde_json::from_slice(request.body)
            .map_err(|e| HookwatchError::MalformedPayload(e.to_string()))?;

        let record = WebhookRecord::received(
            request.method,
            request.headers,
            payload.clone(),
            request.remote_addr,
        );
        let published = self.hub.publish(record)?;

        info!(
            request_id = %published.record.request_id,
            source_ip = %published.record.source_ip,
            total_count = published.total_count,
            viewers = published.delivered,
            "webhook recorded"
        );

        if self.options.echo_stdout {
            echo_to_stdout(Arc::clone(&published.record));
        }

        Ok(payload)
    }
}

/// Print the banner for `record` on stdout.
///
/// Inside a runtime the write goes to the blocking pool: stdout may be a
/// pipe nobody drains, and that must not park an async worker. Banners of
/// concurrent requests can therefore print in either order. The record is
/// already committed, so a failed write is only logged.
fn echo_to_stdout(record: Arc<WebhookRecord>) {
    let write = move || {
        if let Err(e) = write_payload_banner(&mut io::stdout().lock(), &record.payload) {
            warn!(request_id = %record.request_id, error = %e, "failed to echo payload to stdout");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(write);
        }
        Err(_) => write(),
    }
}

/// `application/json` or any `*/*+json` media type, parameters ignored.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(raw) = content_type else {
        return false;
    };
    let essence = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.contains('/') && essence.ends_with("+json"))
}

/// Pretty-print `payload` between banner lines and flush straight away so
/// operators tailing the output see it immediately.
pub fn write_payload_banner<W: Write>(out: &mut W, payload: &Value) -> io::Result<()> {
    let pretty = serde_json::to_string_pretty(payload)?;
    writeln!(out, "\n=== Received JSON Payload ===")?;
    writeln!(out, "{pretty}")?;
    writeln!(out, "===========================\n")?;
    out.flush()
}
