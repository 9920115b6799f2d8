use hookwatch_core::config::MAX_FRAME_BYTES;
use hookwatch_history::{SubscriptionHub, ViewerId};
use hookwatch_protocol::frames::parse_command;
use tracing::{error, warn};

/// Process one inbound WS text frame.
///
/// Anything that is not a well-formed command is logged and dropped; the
/// connection and every other viewer carry on.
pub fn handle(hub: &SubscriptionHub, viewer: &ViewerId, text: &str) {
    if text.len() > MAX_FRAME_BYTES {
        warn!(viewer = %viewer, size = text.len(), "frame too large, ignored");
        return;
    }

    let command = match parse_command(text) {
        Ok(c) => c,
        Err(e) => {
            warn!(viewer = %viewer, error = %e, "ignoring client frame");
            return;
        }
    };

    if let Err(e) = hub.handle(viewer, command) {
        error!(
            viewer = %viewer,
            event = command.event_name(),
            code = e.code(),
            error = %e,
            "client command failed"
        );
    }
}
