use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use bk25_runtime::{Bk25Core, SystemStatus};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "BK25",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn system_status(State(core): State<Arc<Bk25Core>>) -> Json<SystemStatus> {
    Json(core.system_status().await)
}
