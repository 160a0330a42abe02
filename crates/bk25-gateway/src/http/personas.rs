use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use bk25_personas::Persona;
use bk25_runtime::Bk25Core;

use super::{into_api_error, ApiError};

#[derive(Deserialize)]
pub struct ListQuery {
    pub channel: Option<String>,
}

pub async fn list(
    State(core): State<Arc<Bk25Core>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Persona>> {
    let personas = core
        .list_personas(query.channel.as_deref())
        .iter()
        .map(|p| (**p).clone())
        .collect();
    Json(personas)
}

pub async fn current(State(core): State<Arc<Bk25Core>>) -> Json<Option<Persona>> {
    Json(core.current_persona().map(|p| (*p).clone()))
}

pub async fn switch(
    State(core): State<Arc<Bk25Core>>,
    Path(id): Path<String>,
) -> Result<Json<Persona>, ApiError> {
    core.switch_persona(&id)
        .map(|p| Json((*p).clone()))
        .map_err(into_api_error)
}

pub async fn create(
    State(core): State<Arc<Bk25Core>>,
    Json(descriptor): Json<Value>,
) -> Result<Json<Persona>, ApiError> {
    core.create_persona(descriptor)
        .map(|p| Json((*p).clone()))
        .map_err(into_api_error)
}

pub async fn reload(State(core): State<Arc<Bk25Core>>) -> Json<Value> {
    let count = core.reload_personas();
    Json(json!({ "reloaded": count }))
}
