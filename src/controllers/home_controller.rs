use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{error::ApiError, AppState};

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn health_db(State(state): State<AppState>) -> Response {
    match state.alerts.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true, "db": "ok" }))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "store ping failed");
            ApiError::Unavailable("database unavailable".to_string()).into_response()
        }
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
