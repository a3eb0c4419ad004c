use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

pub mod home_controller;
pub mod stocks_controller;
pub mod watchlist_controller;
pub mod alerts_controller;
pub mod internal_controller;

/// `{ success: true, data }` envelope shared by every JSON action.
pub(crate) fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}
