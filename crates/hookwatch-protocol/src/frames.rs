use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::events;

const EVENT_TYPE: &str = "event";

/// Server → Client push event, borrowed from its parts.
/// Wire: `{ "type": "event", "event": "new_webhook", "payload": {...} }`
///
/// Written straight to text: payloads never pass through a `Value`, so an
/// already encoded record is copied as-is.
#[derive(Serialize)]
struct OutboundFrame<'a, P> {
    #[serde(rename = "type")]
    frame_type: &'static str,
    event: &'a str,
    payload: P,
}

fn outbound<P: Serialize>(event: &str, payload: P) -> serde_json::Result<String> {
    serde_json::to_string(&OutboundFrame {
        frame_type: EVENT_TYPE,
        event,
        payload,
    })
}

/// Payload of `new_webhook`. `R` is a
/// [`WebhookRecord`](hookwatch_core::types::WebhookRecord) or its encoded
/// form.
#[derive(Debug, Serialize)]
pub struct NewWebhook<'a, R: ?Sized> {
    pub request: &'a R,
    pub total_count: usize,
}

/// Payload of `history_data`, newest record first.
#[derive(Debug, Serialize)]
pub struct HistoryData<'a, R> {
    pub requests: &'a [R],
    pub total_count: usize,
}

/// Payload of `history_cleared`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryCleared {
    pub timestamp: String,
}

/// Serialized `new_webhook` frame.
pub fn new_webhook<R>(request: &R, total_count: usize) -> serde_json::Result<String>
where
    R: Serialize + ?Sized,
{
    outbound(
        events::NEW_WEBHOOK,
        NewWebhook {
            request,
            total_count,
        },
    )
}

/// Serialized `history_data` frame.
pub fn history_data<R: Serialize>(requests: &[R]) -> serde_json::Result<String> {
    outbound(
        events::HISTORY_DATA,
        HistoryData {
            requests,
            total_count: requests.len(),
        },
    )
}

/// Serialized `history_cleared` frame.
pub fn history_cleared(timestamp: impl Into<String>) -> serde_json::Result<String> {
    outbound(
        events::HISTORY_CLEARED,
        HistoryCleared {
            timestamp: timestamp.into(),
        },
    )
}

/// Client → Server command, after the frame has been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    GetHistory,
    ClearHistory,
}

impl ClientCommand {
    pub fn event_name(self) -> &'static str {
        match self {
            ClientCommand::GetHistory => events::GET_HISTORY,
            ClientCommand::ClearHistory => events::CLEAR_HISTORY,
        }
    }
}

/// Why an inbound text frame was not turned into a [`ClientCommand`].
#[derive(Debug, Error)]
pub enum InvalidFrame {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported frame type '{0}'")]
    UnsupportedType(String),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),
}

/// Raw inbound frame: check the `type` discriminator, then the event name.
/// Wire: `{ "type": "event", "event": "get_history" }`; `payload` is optional
/// and ignored by both commands.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub event: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, InvalidFrame> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn as_command(&self) -> Result<ClientCommand, InvalidFrame> {
        if self.frame_type != EVENT_TYPE {
            return Err(InvalidFrame::UnsupportedType(self.frame_type.clone()));
        }
        match self.event.as_str() {
            events::GET_HISTORY => Ok(ClientCommand::GetHistory),
            events::CLEAR_HISTORY => Ok(ClientCommand::ClearHistory),
            other => Err(InvalidFrame::UnknownEvent(other.to_string())),
        }
    }
}

/// Parse one inbound text frame straight into a command.
pub fn parse_command(text: &str) -> Result<ClientCommand, InvalidFrame> {
    InboundFrame::parse(text)?.as_command()
}
