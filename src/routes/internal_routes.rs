use axum::{Router, routing::post};
use crate::{AppState, controllers::internal_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/internal/alerts/evaluate", post(internal_controller::post_evaluate_alerts))
        .route("/internal/digests/daily", post(internal_controller::post_daily_digest))
        .route("/internal/digests/weekly", post(internal_controller::post_weekly_digest))
}
