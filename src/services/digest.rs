//! Daily and weekly watchlist emails.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use crate::{error::StoreError, models::WatchlistQuote, AppState};

use super::{
    market_data::watchlist_with_data,
    notifier::{Notification, WatchlistDigest, WeeklySummary},
};

#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub total_value: f64,
    pub gainers_count: usize,
    pub losers_count: usize,
    pub top_gainer: Option<WatchlistQuote>,
    pub top_loser: Option<WatchlistQuote>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyStats {
    pub average_change: f64,
    pub best_performer: Option<WatchlistQuote>,
    pub worst_performer: Option<WatchlistQuote>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub users: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn summarize_daily(items: &[WatchlistQuote]) -> DailySummary {
    let total_value = items.iter().filter_map(|q| q.current_price).sum();

    let gainers: Vec<&WatchlistQuote> = items
        .iter()
        .filter(|q| q.change_percent.is_some_and(|c| c > 0.0))
        .collect();
    let losers: Vec<&WatchlistQuote> = items
        .iter()
        .filter(|q| q.change_percent.is_some_and(|c| c < 0.0))
        .collect();

    let change = |q: &&WatchlistQuote| q.change_percent.unwrap_or_default();

    DailySummary {
        total_value,
        gainers_count: gainers.len(),
        losers_count: losers.len(),
        top_gainer: gainers.iter().copied().max_by(|a, b| change(a).total_cmp(&change(b))).cloned(),
        top_loser: losers.iter().copied().min_by(|a, b| change(a).total_cmp(&change(b))).cloned(),
    }
}

/// Entries without a change count as flat.
pub fn summarize_weekly(items: &[WatchlistQuote]) -> WeeklyStats {
    if items.is_empty() {
        return WeeklyStats { average_change: 0.0, best_performer: None, worst_performer: None };
    }

    let change = |q: &&WatchlistQuote| q.change_percent.unwrap_or_default();
    let average_change = items.iter().map(|q| change(&q)).sum::<f64>() / items.len() as f64;

    WeeklyStats {
        average_change,
        best_performer: items.iter().max_by(|a, b| change(a).total_cmp(&change(b))).cloned(),
        worst_performer: items.iter().min_by(|a, b| change(a).total_cmp(&change(b))).cloned(),
    }
}

enum Sent {
    Yes,
    EmptyWatchlist,
}

pub async fn send_daily_watchlist_digest(state: &AppState, now: DateTime<Utc>) -> Result<DigestReport, StoreError> {
    let date = now.format("%A, %B %-d, %Y").to_string();
    let day_key = now.format("%Y-%m-%d").to_string();

    run_for_every_user(state, "daily digest", |user, items| {
        let s = summarize_daily(&items);
        let id = format!("daily:{}:{}", user.id, day_key);
        let n = Notification::WatchlistDigest(WatchlistDigest {
            email: user.email.clone(),
            name: user.display_name().to_string(),
            date: date.clone(),
            items,
            total_value: s.total_value,
            gainers_count: s.gainers_count,
            losers_count: s.losers_count,
            top_gainer: s.top_gainer,
            top_loser: s.top_loser,
        });
        (id, n)
    })
    .await
}

pub async fn send_weekly_watchlist_summary(state: &AppState, now: DateTime<Utc>) -> Result<DigestReport, StoreError> {
    let monday = now.date_naive() - Duration::days(i64::from(now.weekday().num_days_from_monday()));
    let week_of = monday.format("%B %-d, %Y").to_string();
    let week_key = monday.format("%Y-%m-%d").to_string();

    run_for_every_user(state, "weekly summary", |user, items| {
        let s = summarize_weekly(&items);
        let id = format!("weekly:{}:{}", user.id, week_key);
        let n = Notification::WeeklySummary(WeeklySummary {
            email: user.email.clone(),
            name: user.display_name().to_string(),
            week_of: week_of.clone(),
            items,
            average_change: s.average_change,
            best_performer: s.best_performer,
            worst_performer: s.worst_performer,
        });
        (id, n)
    })
    .await
}

async fn run_for_every_user<F>(state: &AppState, job: &'static str, build: F) -> Result<DigestReport, StoreError>
where
    F: Fn(&crate::models::UserContact, Vec<WatchlistQuote>) -> (String, Notification),
{
    let users = state.users.list_users().await?;
    let mut report = DigestReport { users: users.len(), ..Default::default() };

    for user in &users {
        let outcome: Result<Sent, String> = async {
            let entries = state
                .watchlist
                .list_by_user(&user.id)
                .await
                .map_err(|e| e.to_string())?;
            if entries.is_empty() {
                return Ok(Sent::EmptyWatchlist);
            }

            let items = watchlist_with_data(state.market.as_ref(), &entries).await;
            let (id, notification) = build(user, items);

            state
                .notifier
                .emit(&id, &notification)
                .await
                .map_err(|e| e.to_string())?;
            Ok(Sent::Yes)
        }
        .await;

        match outcome {
            Ok(Sent::Yes) => report.sent += 1,
            Ok(Sent::EmptyWatchlist) => report.skipped += 1,
            Err(e) => {
                tracing::error!(job, user = %user.id, error = %e, "cannot send watchlist email");
                report.failed += 1;
            }
        }
    }

    tracing::info!(job, users = report.users, sent = report.sent, failed = report.failed, "watchlist emails done");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(symbol: &str, price: Option<f64>, change: Option<f64>) -> WatchlistQuote {
        WatchlistQuote {
            symbol: symbol.to_string(),
            company: symbol.to_string(),
            added_at: 0,
            current_price: price,
            change_percent: change,
            price_formatted: String::new(),
            change_formatted: String::new(),
            market_cap: String::new(),
            pe_ratio: String::new(),
        }
    }

    #[test]
    fn daily_counts_and_extremes() {
        let items = vec![
            q("AAPL", Some(200.0), Some(1.5)),
            q("MSFT", Some(400.0), Some(3.0)),
            q("TSLA", Some(150.0), Some(-2.0)),
            q("NVDA", None, None),
        ];

        let s = summarize_daily(&items);
        assert_eq!(s.total_value, 750.0);
        assert_eq!(s.gainers_count, 2);
        assert_eq!(s.losers_count, 1);
        assert_eq!(s.top_gainer.unwrap().symbol, "MSFT");
        assert_eq!(s.top_loser.unwrap().symbol, "TSLA");
    }

    #[test]
    fn daily_without_losers_has_no_top_loser() {
        let s = summarize_daily(&[q("AAPL", Some(1.0), Some(0.0))]);
        assert_eq!(s.gainers_count, 0);
        assert!(s.top_gainer.is_none());
        assert!(s.top_loser.is_none());
    }

    #[test]
    fn weekly_average_treats_missing_change_as_flat() {
        let items = vec![q("A", None, Some(4.0)), q("B", None, Some(-1.0)), q("C", None, None)];

        let s = summarize_weekly(&items);
        assert_eq!(s.average_change, 1.0);
        assert_eq!(s.best_performer.unwrap().symbol, "A");
        assert_eq!(s.worst_performer.unwrap().symbol, "B");
    }

    #[test]
    fn weekly_of_nothing() {
        let s = summarize_weekly(&[]);
        assert_eq!(s.average_change, 0.0);
        assert!(s.best_performer.is_none());
    }
}
