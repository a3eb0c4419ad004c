//! Library entrypoint for stockwatch.
//!
//! Kept separate from `main.rs` so integration tests under `tests/` can build
//! the app state and routers against in-memory backends.

use std::{sync::Arc, time::Duration};

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod templates;

#[path = "middleware/auth.rs"]
pub mod auth;

pub mod services;

pub mod controllers;
pub mod routes;

use services::{
    alert_monitor::AlertEvaluator, alerts_service::AlertStore, market_data::MarketData,
    memory_store::MemoryStore, notifier::Notifier, user_directory::UserDirectory,
    watchlist_service::WatchlistStore,
};

#[derive(Clone)]
pub struct AppState {
    pub hbs: templates::Hbs,
    pub settings: config::Settings,
    pub market: Arc<dyn MarketData>,
    pub alerts: Arc<dyn AlertStore>,
    pub watchlist: Arc<dyn WatchlistStore>,
    pub users: Arc<dyn UserDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub evaluator: AlertEvaluator,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        hbs: templates::Hbs,
        market: Arc<dyn MarketData>,
        alerts: Arc<dyn AlertStore>,
        watchlist: Arc<dyn WatchlistStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let evaluator = AlertEvaluator::new(
            alerts.clone(),
            market.clone(),
            users.clone(),
            notifier.clone(),
            Duration::from_secs(settings.http_timeout_secs),
        );

        Self { hbs, settings, market, alerts, watchlist, users, notifier, evaluator }
    }

    /// State backed by a single [`MemoryStore`], which is returned for seeding.
    pub fn in_memory(
        settings: config::Settings,
        hbs: templates::Hbs,
        market: Arc<dyn MarketData>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Self::new(
            settings,
            hbs,
            market,
            store.clone(),
            store.clone(),
            store.clone(),
            notifier,
        );
        (state, store)
    }
}
