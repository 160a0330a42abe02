use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bk25_runtime::Bk25Core;

/// Assemble the full Axum router. Handlers are thin adapters over the core
/// facade; everything interesting happens behind it.
pub fn build_router(core: Arc<Bk25Core>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health))
        .route("/api/status", get(crate::http::health::system_status))
        // personas
        .route(
            "/api/personas",
            get(crate::http::personas::list).post(crate::http::personas::create),
        )
        .route("/api/personas/current", get(crate::http::personas::current))
        .route("/api/personas/reload", post(crate::http::personas::reload))
        .route(
            "/api/personas/{id}/switch",
            post(crate::http::personas::switch),
        )
        // channels
        .route("/api/channels", get(crate::http::channels::list))
        .route(
            "/api/channels/{id}/switch",
            post(crate::http::channels::switch),
        )
        .route(
            "/api/channels/{id}/artifact",
            post(crate::http::channels::artifact),
        )
        // chat & conversations
        .route("/api/chat", post(crate::http::chat::chat))
        .route("/api/conversations", get(crate::http::chat::conversations))
        .route(
            "/api/conversations/{id}",
            get(crate::http::chat::conversation_history),
        )
        // script generation
        .route("/api/scripts/generate", post(crate::http::scripts::generate))
        .route("/api/scripts/improve", post(crate::http::scripts::improve))
        .route("/api/scripts/validate", post(crate::http::scripts::validate))
        .route("/api/scripts/platforms", get(crate::http::scripts::platforms))
        .route(
            "/api/scripts/suggestions",
            post(crate::http::scripts::suggestions),
        )
        .route("/api/llm/status", get(crate::http::scripts::llm_status))
        // execution
        .route("/api/execute", post(crate::http::tasks::execute))
        .route(
            "/api/tasks",
            post(crate::http::tasks::submit).get(crate::http::tasks::running),
        )
        .route("/api/tasks/history", get(crate::http::tasks::history))
        .route("/api/tasks/{id}", get(crate::http::tasks::status))
        .route("/api/tasks/{id}/metrics", get(crate::http::tasks::metrics))
        .route("/api/tasks/{id}/cancel", post(crate::http::tasks::cancel))
        .route("/api/tasks/{id}/pause", post(crate::http::tasks::pause))
        .route("/api/tasks/{id}/resume", post(crate::http::tasks::resume))
        .route("/api/statistics", get(crate::http::tasks::statistics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(core)
}
