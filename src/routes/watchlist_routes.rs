use axum::{Router, routing::{delete, get}};
use crate::{AppState, controllers::watchlist_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/api/watchlist",
            get(watchlist_controller::get_watchlist).post(watchlist_controller::post_add),
        )
        .route("/api/watchlist/symbols", get(watchlist_controller::get_watchlist_symbols))
        .route("/api/watchlist/:symbol", delete(watchlist_controller::delete_symbol))
}
