//! Outbound notifications.
//!
//! Every user-facing message goes through [`Notifier::emit`]. The production
//! implementation hands a named event to the background-job ingest, which
//! takes care of delivery and de-duplicates on the event id.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::{
    error::NotifyError,
    models::{AlertType, Frequency, WatchlistQuote},
    templates::{render_email, Hbs},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCreated {
    pub email: String,
    pub alert_name: String,
    pub symbol: String,
    pub company: String,
    pub alert_type: AlertType,
    pub threshold: f64,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTriggered {
    pub email: String,
    pub alert_name: String,
    pub symbol: String,
    pub company: String,
    pub current_price: f64,
    pub threshold: f64,
    pub alert_type: AlertType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistDigest {
    pub email: String,
    pub name: String,
    pub date: String,
    pub items: Vec<WatchlistQuote>,
    pub total_value: f64,
    pub gainers_count: usize,
    pub losers_count: usize,
    pub top_gainer: Option<WatchlistQuote>,
    pub top_loser: Option<WatchlistQuote>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub email: String,
    pub name: String,
    pub week_of: String,
    pub items: Vec<WatchlistQuote>,
    pub average_change: f64,
    pub best_performer: Option<WatchlistQuote>,
    pub worst_performer: Option<WatchlistQuote>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Notification {
    AlertCreated(AlertCreated),
    AlertTriggered(AlertTriggered),
    WatchlistDigest(WatchlistDigest),
    WeeklySummary(WeeklySummary),
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::AlertCreated(_) => "app/alert.created",
            Notification::AlertTriggered(_) => "app/alert.triggered",
            Notification::WatchlistDigest(_) => "app/watchlist.daily",
            Notification::WeeklySummary(_) => "app/watchlist.weekly",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::AlertCreated(p) => &p.email,
            Notification::AlertTriggered(p) => &p.email,
            Notification::WatchlistDigest(p) => &p.email,
            Notification::WeeklySummary(p) => &p.email,
        }
    }

    /// The event payload, without the rendered email.
    pub fn data(&self) -> Result<serde_json::Value, NotifyError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// `event_id` doubles as the idempotency key on the receiving side.
    async fn emit(&self, event_id: &str, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct HttpEventNotifier {
    http: reqwest::Client,
    endpoint: String,
    hbs: Hbs,
    app_url: String,
}

impl HttpEventNotifier {
    pub fn new(event_api_url: &str, event_key: &str, hbs: Hbs, app_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            endpoint: format!("{}/{}", event_api_url.trim_end_matches('/'), event_key),
            hbs,
            app_url: app_url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for HttpEventNotifier {
    async fn emit(&self, event_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        let email = render_email(&self.hbs, notification, &self.app_url)?;

        let body = json!({
            "name": notification.event_name(),
            "id": event_id,
            "data": notification.data()?,
            "email": {
                "to": email.to,
                "subject": email.subject,
                "html": email.html,
            },
        });

        let resp = self.http.post(&self.endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status: status.as_u16(), body });
        }

        tracing::debug!(event = notification.event_name(), id = event_id, "event accepted");
        Ok(())
    }
}

/// Used when no event key is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn emit(&self, event_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            event = notification.event_name(),
            id = event_id,
            to = notification.recipient(),
            "notification (not delivered, EVENT_KEY unset)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggered() -> Notification {
        Notification::AlertTriggered(AlertTriggered {
            email: "ann@example.com".into(),
            alert_name: "Breakout".into(),
            symbol: "AAPL".into(),
            company: "Apple Inc".into(),
            current_price: 201.5,
            threshold: 200.0,
            alert_type: AlertType::Upper,
        })
    }

    #[test]
    fn payload_is_camel_case_without_variant_tag() {
        let data = triggered().data().unwrap();
        assert_eq!(data["alertName"], "Breakout");
        assert_eq!(data["currentPrice"], 201.5);
        assert_eq!(data["alertType"], "upper");
        assert!(data.get("AlertTriggered").is_none());
    }

    #[test]
    fn event_names() {
        assert_eq!(triggered().event_name(), "app/alert.triggered");
        assert_eq!(triggered().recipient(), "ann@example.com");
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        LogNotifier.emit("x:1", &triggered()).await.unwrap();
    }
}
