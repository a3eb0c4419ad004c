use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    controllers::ok,
    error::{ApiError, MarketDataError},
    models::{normalize_symbol, CurrentUser},
    services::market_data::mark_watchlisted,
    AppState,
};

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

// GET /api/stocks/search?q=
pub async fn get_search(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let q = query.q.unwrap_or_default();

    let mut items = match state.market.search_stocks(&q).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(query = %q, error = %e, "stock search failed");
            Vec::new()
        }
    };

    let watched: Vec<String> = state
        .watchlist
        .list_by_user(&user.id)
        .await?
        .into_iter()
        .map(|e| e.symbol)
        .collect();
    mark_watchlisted(&mut items, &watched);

    Ok(ok(items))
}

// GET /api/stocks/:symbol
pub async fn get_details(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sym = normalize_symbol(&symbol)?;

    match state.market.get_stock_details(&sym).await {
        Ok(details) => Ok(ok(details)),
        Err(MarketDataError::Status { status: 404, .. }) => Err(ApiError::NotFound("Stock not found".to_string())),
        Err(e) => {
            tracing::warn!(symbol = %sym, error = %e, "stock details failed");
            Err(ApiError::Unavailable("Market data unavailable".to_string()))
        }
    }
}
