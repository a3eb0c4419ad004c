#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::response::Response;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};

use stockwatch::{
    auth::Claims,
    config::{self, DataBackend, Settings},
    error::{MarketDataError, NotifyError},
    models::{StockDetails, StockSearchItem},
    services::{
        market_data::MarketData,
        memory_store::MemoryStore,
        notifier::{Notification, Notifier},
    },
    templates, AppState,
};

pub const JWT_SECRET: &str = "test-secret";

pub fn test_settings() -> Settings {
    let mut settings = config::load();
    settings.jwt_secret = JWT_SECRET.to_string();
    settings.jwt_cookie_name = "auth".to_string();
    settings.finnhub_api_key = String::new();
    settings.event_key = String::new();
    settings.cron_secret = "cron-secret".to_string();
    settings.http_timeout_secs = 2;
    settings.data_backend = DataBackend::Memory;
    settings.scheduler_enabled = false;
    settings
}

/// Prices keyed by symbol; unknown symbols fail like an upstream error.
#[derive(Default)]
pub struct FakeMarket {
    prices: Mutex<HashMap<String, (f64, f64)>>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn set(&self, symbol: &str, price: f64, change: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), (price, change));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn get_stock_details(&self, symbol: &str) -> Result<StockDetails, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }

        let quote = self.prices.lock().unwrap().get(symbol).copied();
        match quote {
            Some((price, change)) => Ok(StockDetails::new(
                symbol,
                Some(format!("{symbol} Inc")),
                Some(price),
                Some(change),
                Some(2.5e12),
                Some(30.0),
            )),
            None => Err(MarketDataError::Status { status: 404, body: "unknown symbol".into() }),
        }
    }

    async fn search_stocks(&self, query: &str) -> Result<Vec<StockSearchItem>, MarketDataError> {
        let q = query.trim().to_uppercase();
        let mut items: Vec<StockSearchItem> = self
            .prices
            .lock()
            .unwrap()
            .keys()
            .filter(|s| q.is_empty() || s.contains(&q))
            .map(|s| StockSearchItem {
                symbol: s.clone(),
                name: format!("{s} Inc"),
                exchange: "NASDAQ".into(),
                kind: "Common Stock".into(),
                is_in_watchlist: false,
            })
            .collect();
        items.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(items)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit(&self, event_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((event_id.to_string(), notification.clone()));
        Ok(())
    }
}

/// Fails the first `failures` emits, then records like [`RecordingNotifier`].
///
/// With `delivered_anyway` the failing emits are still recorded, as when the
/// ingest accepted the event but the response never made it back.
pub struct FlakyNotifier {
    failures: AtomicUsize,
    delivered_anyway: bool,
    pub inner: RecordingNotifier,
}

impl FlakyNotifier {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            delivered_anyway: false,
            inner: RecordingNotifier::default(),
        }
    }

    pub fn lost_acks(failures: usize) -> Self {
        Self { delivered_anyway: true, ..Self::failing(failures) }
    }
}

#[async_trait]
impl Notifier for FlakyNotifier {
    async fn emit(&self, event_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            if self.delivered_anyway {
                self.inner.emit(event_id, notification).await?;
            }
            return Err(NotifyError::Status { status: 503, body: "ingest down".into() });
        }
        self.inner.emit(event_id, notification).await
    }
}

/// Records like [`RecordingNotifier`] after sleeping for `delay`.
pub struct SlowNotifier {
    delay: Duration,
    pub inner: RecordingNotifier,
}

impl SlowNotifier {
    pub fn new(delay: Duration) -> Self {
        Self { delay, inner: RecordingNotifier::default() }
    }
}

#[async_trait]
impl Notifier for SlowNotifier {
    async fn emit(&self, event_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        tokio::time::sleep(self.delay).await;
        self.inner.emit(event_id, notification).await
    }
}

pub fn memory_state(
    market: Arc<dyn MarketData>,
    notifier: Arc<dyn Notifier>,
) -> (AppState, Arc<MemoryStore>) {
    let hbs = templates::build_handlebars().unwrap();
    AppState::in_memory(test_settings(), hbs, market, notifier)
}

pub fn session_token(user_id: &str, email: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        name: Some("Test User".to_string()),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

pub async fn body_json(res: Response) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
