pub mod channels;
pub mod chat;
pub mod health;
pub mod personas;
pub mod scripts;
pub mod tasks;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use bk25_core::error::Bk25Error;

/// Error envelope returned by every route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

/// Map core errors onto HTTP statuses.
pub fn into_api_error(err: Bk25Error) -> ApiError {
    let status = match err.code() {
        "invalid_input" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "policy_violation" => StatusCode::FORBIDDEN,
        "llm_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
            code: err.code(),
        }),
    )
}
