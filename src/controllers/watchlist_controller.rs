use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    controllers::ok,
    error::{ApiError, StoreError},
    models::CurrentUser,
    services::market_data::watchlist_with_data,
    AppState,
};

#[derive(Deserialize)]
pub struct AddToWatchlist {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub company: String,
}

// GET /api/watchlist
pub async fn get_watchlist(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let entries = state.watchlist.list_by_user(&user.id).await?;
    let items = watchlist_with_data(state.market.as_ref(), &entries).await;

    Ok(ok(items))
}

// GET /api/watchlist/symbols
pub async fn get_watchlist_symbols(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    let symbols: Vec<String> = state
        .watchlist
        .list_by_user(&user.id)
        .await?
        .into_iter()
        .map(|e| e.symbol)
        .collect();

    Ok(ok(symbols))
}

// POST /api/watchlist
pub async fn post_add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Result<Json<AddToWatchlist>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(form) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let entry = state
        .watchlist
        .add(&user.id, &form.symbol, &form.company)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => ApiError::Conflict("Stock already in watchlist".to_string()),
            other => other.into(),
        })?;

    tracing::info!(user = %user.id, symbol = %entry.symbol, "added to watchlist");

    Ok((
        StatusCode::CREATED,
        ok(json!({
            "symbol": entry.symbol,
            "company": entry.company,
            "addedAt": entry.added_at,
        })),
    ))
}

// DELETE /api/watchlist/:symbol
pub async fn delete_symbol(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .watchlist
        .remove(&user.id, &symbol)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ApiError::NotFound("Stock not found in watchlist".to_string()),
            other => other.into(),
        })?;

    Ok(Json(json!({ "success": true })))
}
