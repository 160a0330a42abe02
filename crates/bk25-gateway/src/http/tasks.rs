use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use bk25_core::types::Platform;
use bk25_executor::types::{
    ExecutionRequest, ExecutionResult, ExecutionStatistics, ExecutionTask, HistoryFilters,
    TaskDescriptor, TaskMetrics, TaskStatus,
};
use bk25_runtime::Bk25Core;

use super::{into_api_error, ApiError};

pub async fn execute(
    State(core): State<Arc<Bk25Core>>,
    Json(request): Json<ExecutionRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    core.execute(request).await.map(Json).map_err(into_api_error)
}

pub async fn submit(
    State(core): State<Arc<Bk25Core>>,
    Json(descriptor): Json<TaskDescriptor>,
) -> Result<Json<Value>, ApiError> {
    core.submit_task(descriptor)
        .map(|task_id| Json(json!({ "task_id": task_id })))
        .map_err(into_api_error)
}

pub async fn status(
    State(core): State<Arc<Bk25Core>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionTask>, ApiError> {
    core.task_status(&id).map(Json).map_err(into_api_error)
}

pub async fn metrics(
    State(core): State<Arc<Bk25Core>>,
    Path(id): Path<String>,
) -> Result<Json<TaskMetrics>, ApiError> {
    core.task_metrics(&id).map(Json).map_err(into_api_error)
}

pub async fn cancel(State(core): State<Arc<Bk25Core>>, Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "cancelled": core.cancel_task(&id) }))
}

pub async fn pause(State(core): State<Arc<Bk25Core>>, Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "paused": core.pause_task(&id) }))
}

pub async fn resume(State(core): State<Arc<Bk25Core>>, Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "resumed": core.resume_task(&id) }))
}

pub async fn running(State(core): State<Arc<Bk25Core>>) -> Json<Vec<ExecutionTask>> {
    Json(core.running_tasks())
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub status: Option<TaskStatus>,
    pub platform: Option<Platform>,
    pub tag: Option<String>,
}

fn default_limit() -> usize {
    100
}

pub async fn history(
    State(core): State<Arc<Bk25Core>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<ExecutionTask>> {
    let filters = HistoryFilters {
        status: query.status,
        platform: query.platform,
        tag: query.tag,
    };
    Json(core.task_history(query.limit, &filters))
}

pub async fn statistics(State(core): State<Arc<Bk25Core>>) -> Json<ExecutionStatistics> {
    Json(core.statistics())
}
