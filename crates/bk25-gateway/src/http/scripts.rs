use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use bk25_codegen::types::{
    GenerationRequest, GenerationResult, PlatformInfo, ScriptReview, Suggestion,
};
use bk25_core::types::Platform;
use bk25_runtime::Bk25Core;

pub async fn generate(
    State(core): State<Arc<Bk25Core>>,
    Json(request): Json<GenerationRequest>,
) -> Json<GenerationResult> {
    Json(core.generate_script(request).await)
}

#[derive(Deserialize)]
pub struct ImproveRequest {
    pub script: String,
    pub feedback: String,
    pub platform: Platform,
}

pub async fn improve(
    State(core): State<Arc<Bk25Core>>,
    Json(request): Json<ImproveRequest>,
) -> Json<GenerationResult> {
    Json(
        core.improve_script(&request.script, &request.feedback, request.platform)
            .await,
    )
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub script: String,
    pub platform: Platform,
}

pub async fn validate(
    State(core): State<Arc<Bk25Core>>,
    Json(request): Json<ValidateRequest>,
) -> Json<ScriptReview> {
    Json(core.review_script(&request.script, request.platform).await)
}

pub async fn platforms(State(core): State<Arc<Bk25Core>>) -> Json<Vec<PlatformInfo>> {
    Json(core.platforms())
}

#[derive(Deserialize)]
pub struct SuggestionsRequest {
    pub description: String,
}

pub async fn suggestions(
    State(core): State<Arc<Bk25Core>>,
    Json(request): Json<SuggestionsRequest>,
) -> Json<Vec<Suggestion>> {
    Json(core.suggestions(&request.description))
}

pub async fn llm_status(State(core): State<Arc<Bk25Core>>) -> Json<BTreeMap<String, bool>> {
    Json(core.llm_status().await)
}
