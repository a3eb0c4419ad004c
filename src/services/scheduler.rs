use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc, Weekday};
use tokio::time::{self, MissedTickBehavior};

use crate::AppState;

use super::{
    alert_monitor::AlertEvaluator,
    digest::{send_daily_watchlist_digest, send_weekly_watchlist_summary},
};

/// Next instant strictly after `now` at `hour:00` UTC.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));

    if today > now { today } else { today + chrono::Duration::days(1) }
}

/// Next instant strictly after `now` on `weekday` at `hour:00` UTC.
pub fn next_weekly_run(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let mut next = next_daily_run(now, hour);
    while next.weekday() != weekday {
        next += chrono::Duration::days(1);
    }
    next
}

pub fn spawn_alert_monitor(evaluator: AlertEvaluator, every: Duration) {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if let Err(e) = evaluator.evaluate_all_alerts().await {
                tracing::warn!(error = %e, "alert pass not run");
            }
        }
    });
}

async fn sleep_until(at: DateTime<Utc>) {
    let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    time::sleep(wait).await;
}

pub fn spawn_digest_jobs(state: AppState) {
    let hour = state.settings.digest_hour_utc;

    // each run is scheduled from the previous slot, never from a re-read clock
    let daily = state.clone();
    tokio::spawn(async move {
        let mut at = next_daily_run(Utc::now(), hour);
        loop {
            tracing::debug!(%at, "next daily digest");
            sleep_until(at).await;

            if let Err(e) = send_daily_watchlist_digest(&daily, at).await {
                tracing::error!(error = %e, "daily digest failed");
            }
            at = next_daily_run(at.max(Utc::now()), hour);
        }
    });

    tokio::spawn(async move {
        let mut at = next_weekly_run(Utc::now(), Weekday::Mon, hour);
        loop {
            tracing::debug!(%at, "next weekly summary");
            sleep_until(at).await;

            if let Err(e) = send_weekly_watchlist_summary(&state, at).await {
                tracing::error!(error = %e, "weekly summary failed");
            }
            at = next_weekly_run(at.max(Utc::now()), Weekday::Mon, hour);
        }
    });
}
