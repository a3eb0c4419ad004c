//! Job triggers for an external scheduler, guarded by a shared secret.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::Value;

use crate::{
    controllers::ok,
    error::{ApiError, MonitorError},
    services::digest::{send_daily_watchlist_digest, send_weekly_watchlist_summary},
    AppState,
};

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

fn check_cron_secret(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = state.settings.cron_secret.as_str();
    if expected.is_empty() {
        return Err(ApiError::Forbidden);
    }

    let given = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !secrets_match(given.as_bytes(), expected.as_bytes()) {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

// constant time over the expected length
fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    let diff = expected
        .iter()
        .enumerate()
        .fold(given.len() ^ expected.len(), |acc, (i, b)| {
            acc | usize::from(given.get(i).copied().unwrap_or(0) ^ b)
        });
    diff == 0
}

// POST /internal/alerts/evaluate
pub async fn post_evaluate_alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_cron_secret(&state, &headers)?;

    match state.evaluator.evaluate_all_alerts().await {
        Ok(report) => Ok(ok(report)),
        Err(MonitorError::PassInProgress) => Err(ApiError::Conflict(MonitorError::PassInProgress.to_string())),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

// POST /internal/digests/daily
pub async fn post_daily_digest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_cron_secret(&state, &headers)?;

    let report = send_daily_watchlist_digest(&state, Utc::now()).await?;
    Ok(ok(report))
}

// POST /internal/digests/weekly
pub async fn post_weekly_digest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    check_cron_secret(&state, &headers)?;

    let report = send_weekly_watchlist_summary(&state, Utc::now()).await?;
    Ok(ok(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_must_match_exactly() {
        assert!(secrets_match(b"cron-secret", b"cron-secret"));
        assert!(!secrets_match(b"cron-secreT", b"cron-secret"));
        assert!(!secrets_match(b"cron", b"cron-secret"));
        assert!(!secrets_match(b"cron-secret-and-more", b"cron-secret"));
        assert!(!secrets_match(b"", b"cron-secret"));
    }
}
