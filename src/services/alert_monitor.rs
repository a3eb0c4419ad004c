//! Periodic price-alert evaluation.
//!
//! A pass loads every active alert, quotes each symbol once and notifies the
//! owners of alerts whose condition holds. The trigger is claimed in the store
//! with a conditional update before anything is sent, so overlapping passes
//! (or a second replica) cannot notify twice for the same trigger. The pass
//! itself runs on its own task, so a caller that stops waiting (a request
//! timeout, a dropped connection) never leaves a claim without its
//! notification or its release.

use std::{collections::BTreeMap, fmt::Display, future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    error::MonitorError,
    models::{Alert, AlertType, Frequency, TriggerUpdate},
};

use super::{
    alerts_service::AlertStore,
    market_data::MarketData,
    notifier::{AlertTriggered, Notification, Notifier},
    user_directory::UserDirectory,
};

const SECS_PER_DAY: f64 = 86_400.0;

/// Both bounds are inclusive.
pub fn should_trigger(alert_type: AlertType, threshold: f64, price: f64) -> bool {
    match alert_type {
        AlertType::Upper => price >= threshold,
        AlertType::Lower => price <= threshold,
    }
}

pub fn can_retrigger(frequency: Frequency, last_triggered: Option<i64>, now: i64) -> bool {
    let Some(last) = last_triggered else {
        return true;
    };

    match frequency.min_days_between() {
        None => false,
        Some(min_days) => (now - last) as f64 / SECS_PER_DAY >= min_days,
    }
}

/// Keyed by the trigger window, so retries of one trigger share the same id.
pub fn trigger_event_id(alert_id: &ObjectId, previous_trigger: Option<i64>) -> String {
    match previous_trigger {
        Some(last) => format!("{}:{}", alert_id.to_hex(), last),
        None => format!("{}:never", alert_id.to_hex()),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    pub evaluated: usize,
    pub triggered: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    NotMet,
    Triggered,
    Skipped,
    Failed,
}

#[derive(Clone)]
pub struct AlertEvaluator {
    alerts: Arc<dyn AlertStore>,
    market: Arc<dyn MarketData>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    running: Arc<Mutex<()>>,
    call_timeout: Duration,
}

impl AlertEvaluator {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        market: Arc<dyn MarketData>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            alerts,
            market,
            users,
            notifier,
            running: Arc::new(Mutex::new(())),
            call_timeout,
        }
    }

    pub async fn evaluate_all_alerts(&self) -> Result<EvaluationReport, MonitorError> {
        self.evaluate_all_alerts_at(Utc::now().timestamp()).await
    }

    /// Runs one pass as of `now` (unix seconds).
    ///
    /// Dropping the returned future does not cancel the pass; it keeps
    /// running to completion in the background.
    pub async fn evaluate_all_alerts_at(&self, now: i64) -> Result<EvaluationReport, MonitorError> {
        let pass = self
            .running
            .clone()
            .try_lock_owned()
            .map_err(|_| MonitorError::PassInProgress)?;

        let this = self.clone();
        tokio::spawn(async move {
            let _pass = pass;
            this.run_pass(now).await
        })
        .await
        .map_err(|e| MonitorError::Aborted(e.to_string()))?
    }

    async fn run_pass(&self, now: i64) -> Result<EvaluationReport, MonitorError> {
        let active = tokio::time::timeout(self.call_timeout, self.alerts.list_active())
            .await
            .map_err(|_| MonitorError::ListingTimedOut)??;

        let mut by_symbol: BTreeMap<String, Vec<Alert>> = BTreeMap::new();
        for a in active {
            by_symbol.entry(a.symbol.clone()).or_default().push(a);
        }

        let mut report = EvaluationReport::default();

        for (symbol, group) in by_symbol {
            let price = self.current_price(&symbol).await;

            for alert in &group {
                report.evaluated += 1;
                match self.evaluate_one(alert, price, now).await {
                    Outcome::NotMet => {}
                    Outcome::Triggered => report.triggered += 1,
                    Outcome::Skipped => report.skipped += 1,
                    Outcome::Failed => report.failed += 1,
                }
            }
        }

        tracing::info!(
            evaluated = report.evaluated,
            triggered = report.triggered,
            skipped = report.skipped,
            failed = report.failed,
            "alert pass finished"
        );

        Ok(report)
    }

    async fn within<T, E: Display>(&self, fut: impl Future<Output = Result<T, E>>) -> Result<T, String> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(res) => res.map_err(|e| e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.call_timeout)),
        }
    }

    async fn current_price(&self, symbol: &str) -> Option<f64> {
        match self.within(self.market.get_stock_details(symbol)).await {
            Ok(d) => {
                if d.current_price.is_none() {
                    tracing::warn!(%symbol, "no usable price, skipping alerts");
                }
                d.current_price
            }
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "quote failed, skipping alerts");
                None
            }
        }
    }

    async fn evaluate_one(&self, alert: &Alert, price: Option<f64>, now: i64) -> Outcome {
        let Some(price) = price else {
            return Outcome::Skipped;
        };

        if !should_trigger(alert.alert_type, alert.threshold, price) {
            return Outcome::NotMet;
        }

        if !can_retrigger(alert.frequency, alert.last_triggered, now) {
            return Outcome::Skipped;
        }

        let email = match self.within(self.users.resolve_user_email(&alert.user_id)).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                tracing::warn!(alert = %alert.id, user = %alert.user_id, "owner has no email, skipping");
                return Outcome::Skipped;
            }
            Err(e) => {
                tracing::error!(alert = %alert.id, error = %e, "owner lookup failed");
                return Outcome::Failed;
            }
        };

        let claim = TriggerUpdate {
            last_triggered: Some(now),
            is_active: alert.frequency != Frequency::Once,
        };

        match self
            .within(self.alerts.update_trigger_state(alert.id, alert.last_triggered, claim))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(alert = %alert.id, "trigger already claimed or alert removed");
                return Outcome::Skipped;
            }
            Err(e) => {
                tracing::error!(alert = %alert.id, error = %e, "cannot claim trigger");
                return Outcome::Failed;
            }
        }

        let notification = Notification::AlertTriggered(AlertTriggered {
            email,
            alert_name: alert.alert_name.clone(),
            symbol: alert.symbol.clone(),
            company: alert.company.clone(),
            current_price: price,
            threshold: alert.threshold,
            alert_type: alert.alert_type,
        });

        let event_id = trigger_event_id(&alert.id, alert.last_triggered);
        if let Err(e) = self.within(self.notifier.emit(&event_id, &notification)).await {
            tracing::error!(alert = %alert.id, error = %e, "trigger notification failed, releasing claim");
            self.release_claim(alert, now).await;
            return Outcome::Failed;
        }

        tracing::info!(alert = %alert.id, symbol = %alert.symbol, price, "alert triggered");
        Outcome::Triggered
    }

    // undo a claim whose notification never went out so the next pass retries it
    async fn release_claim(&self, alert: &Alert, now: i64) {
        let restore = TriggerUpdate {
            last_triggered: alert.last_triggered,
            is_active: true,
        };

        match self
            .within(self.alerts.update_trigger_state(alert.id, Some(now), restore))
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!(alert = %alert.id, "claim changed before it could be released"),
            Err(e) => tracing::error!(alert = %alert.id, error = %e, "cannot release claim"),
        }
    }
}
