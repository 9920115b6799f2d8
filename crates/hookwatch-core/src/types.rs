use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Header name -> value, in request order.
pub type Headers = Map<String, Value>;

/// Placeholder for `source_ip` when the transport cannot name the peer.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Unique identifier for one received webhook (random UUIDv4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// One received webhook. Never mutated after it enters the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRecord {
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub headers: Headers,
    pub payload: Value,
    pub source_ip: String,
    pub request_id: RequestId,
}

impl WebhookRecord {
    /// Stamp a freshly received request with the current time and a new id.
    pub fn received(
        method: impl Into<String>,
        headers: Headers,
        payload: Value,
        source_ip: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            method: method.into(),
            headers,
            payload,
            source_ip: source_ip.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            request_id: RequestId::new(),
        }
    }
}

/// Current UTC instant in the wire timestamp format.
pub fn now_iso8601() -> String {
    iso8601::format(&Utc::now())
}

/// `YYYY-MM-DDTHH:MM:SS.ffffffZ` (microseconds, always `Z`).
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
