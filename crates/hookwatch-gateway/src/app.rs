use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use hookwatch_core::config::{HookwatchConfig, MAX_HISTORY_SIZE};
use hookwatch_history::{HistoryStore, Ingestor, SubscriptionHub};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: HookwatchConfig,
    /// History + viewer registry; every mutation goes through it.
    pub hub: Arc<SubscriptionHub>,
    pub ingestor: Ingestor,
}

impl AppState {
    pub fn new(config: HookwatchConfig) -> Self {
        let hub = Arc::new(SubscriptionHub::new(HistoryStore::new(MAX_HISTORY_SIZE)));
        let ingestor = Ingestor::new(Arc::clone(&hub), config.ingest.clone());
        Self {
            config,
            hub,
            ingestor,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/",
            get(crate::http::ui::ui_handler).post(crate::http::ingest::ingest_handler),
        )
        .route("/ws", get(crate::ws::connection::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
