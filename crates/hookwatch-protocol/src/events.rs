// Real-time channel event names, must match the viewer page.

// server → client
pub const NEW_WEBHOOK: &str = "new_webhook";
pub const HISTORY_DATA: &str = "history_data";
pub const HISTORY_CLEARED: &str = "history_cleared";

// client → server
pub const GET_HISTORY: &str = "get_history";
pub const CLEAR_HISTORY: &str = "clear_history";
