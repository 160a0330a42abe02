use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use bk25_channels::{ArtifactEnvelope, Channel};
use bk25_runtime::{Bk25Core, ChannelView};

use super::{into_api_error, ApiError};

pub async fn list(State(core): State<Arc<Bk25Core>>) -> Json<Vec<Channel>> {
    Json(core.list_channels().iter().map(|c| (**c).clone()).collect())
}

pub async fn switch(
    State(core): State<Arc<Bk25Core>>,
    Path(id): Path<String>,
) -> Result<Json<ChannelView>, ApiError> {
    core.switch_channel(&id).map(Json).map_err(into_api_error)
}

#[derive(Deserialize)]
pub struct ArtifactRequest {
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub options: Value,
}

pub async fn artifact(
    State(core): State<Arc<Bk25Core>>,
    Path(id): Path<String>,
    Json(request): Json<ArtifactRequest>,
) -> Result<Json<ArtifactEnvelope>, ApiError> {
    core.channel_artifact(&id, &request.kind, &request.description, &request.options)
        .map(Json)
        .map_err(into_api_error)
}
