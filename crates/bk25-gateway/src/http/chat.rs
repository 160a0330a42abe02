use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use bk25_memory::{ConversationMessage, ConversationSummary};
use bk25_runtime::{Bk25Core, ChatOutcome, ChatRequest};

use super::{into_api_error, ApiError};

pub async fn chat(
    State(core): State<Arc<Bk25Core>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    core.chat(request).await.map(Json).map_err(into_api_error)
}

pub async fn conversations(
    State(core): State<Arc<Bk25Core>>,
) -> Json<Vec<ConversationSummary>> {
    Json(core.conversations())
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn conversation_history(
    State(core): State<Arc<Bk25Core>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<ConversationMessage>> {
    Json(core.conversation_history(&id, query.limit))
}
