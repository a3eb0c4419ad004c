//! In-process backend with the same semantics as the Mongo stores.
//!
//! Selected with `DATA_BACKEND=memory` for local runs without a database, and
//! used by the integration tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;

use crate::{
    error::StoreError,
    models::{normalize_symbol, Alert, NewAlert, TriggerUpdate, UserContact, WatchlistEntry},
};

use super::{
    alerts_service::AlertStore,
    user_directory::UserDirectory,
    watchlist_service::{new_entry, WatchlistStore},
};

#[derive(Default)]
struct Inner {
    alerts: Vec<Alert>,
    watchlist: Vec<WatchlistEntry>,
    users: HashMap<String, UserContact>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("memory store poisoned".to_string()))
    }

    pub fn upsert_user(&self, user: UserContact) -> Result<(), StoreError> {
        self.lock()?.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Inserts an alert as-is, bypassing `create` (fixtures, imports).
    pub fn insert_alert(&self, alert: Alert) -> Result<(), StoreError> {
        self.lock()?.alerts.push(alert);
        Ok(())
    }

    pub fn alert(&self, alert_id: ObjectId) -> Result<Option<Alert>, StoreError> {
        Ok(self.lock()?.alerts.iter().find(|a| a.id == alert_id).cloned())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn create(&self, user_id: &str, alert: NewAlert) -> Result<Alert, StoreError> {
        let alert = alert.into_alert(user_id, Utc::now().timestamp());
        self.lock()?.alerts.push(alert.clone());
        Ok(alert)
    }

    async fn delete(&self, alert_id: ObjectId, user_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let before = inner.alerts.len();
        inner.alerts.retain(|a| !(a.id == alert_id && a.user_id == user_id));

        if inner.alerts.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str, symbol: Option<&str>) -> Result<Vec<Alert>, StoreError> {
        let sym = symbol.map(|s| s.trim().to_uppercase());
        let inner = self.lock()?;

        let mut items: Vec<Alert> = inner
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id && a.is_active)
            .filter(|a| sym.as_ref().is_none_or(|s| &a.symbol == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(items)
    }

    async fn list_active(&self) -> Result<Vec<Alert>, StoreError> {
        Ok(self.lock()?.alerts.iter().filter(|a| a.is_active).cloned().collect())
    }

    async fn update_trigger_state(
        &self,
        alert_id: ObjectId,
        expected_last_triggered: Option<i64>,
        update: TriggerUpdate,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;

        let Some(alert) = inner
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.last_triggered == expected_last_triggered)
        else {
            return Ok(false);
        };

        alert.last_triggered = update.last_triggered;
        alert.is_active = update.is_active;
        alert.updated_at = Utc::now().timestamp();
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl WatchlistStore for MemoryStore {
    async fn add(&self, user_id: &str, symbol: &str, company: &str) -> Result<WatchlistEntry, StoreError> {
        let entry = new_entry(user_id, symbol, company)?;
        let mut inner = self.lock()?;

        if inner
            .watchlist
            .iter()
            .any(|e| e.user_id == user_id && e.symbol == entry.symbol)
        {
            return Err(StoreError::AlreadyExists);
        }

        inner.watchlist.push(entry.clone());
        Ok(entry)
    }

    async fn remove(&self, user_id: &str, symbol: &str) -> Result<(), StoreError> {
        let sym = normalize_symbol(symbol)?;
        let mut inner = self.lock()?;

        let before = inner.watchlist.len();
        inner.watchlist.retain(|e| !(e.user_id == user_id && e.symbol == sym));

        if inner.watchlist.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchlistEntry>, StoreError> {
        let inner = self.lock()?;

        let mut items: Vec<WatchlistEntry> = inner
            .watchlist
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));

        Ok(items)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn resolve_user_email(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock()?
            .users
            .get(user_id)
            .map(|u| u.email.trim().to_string())
            .filter(|e| !e.is_empty()))
    }

    async fn list_users(&self) -> Result<Vec<UserContact>, StoreError> {
        let inner = self.lock()?;

        let mut users: Vec<UserContact> = inner
            .users
            .values()
            .filter(|u| !u.email.trim().is_empty())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, Frequency};

    fn new_alert() -> NewAlert {
        NewAlert::new("AAPL", "Apple Inc", "Breakout", AlertType::Upper, 100.0, Frequency::Once).unwrap()
    }

    #[tokio::test]
    async fn conditional_update_applies_once() {
        let store = MemoryStore::new();
        let a = AlertStore::create(&store, "u1", new_alert()).await.unwrap();

        let claim = TriggerUpdate { last_triggered: Some(10), is_active: false };
        assert!(store.update_trigger_state(a.id, None, claim).await.unwrap());
        // the second writer still expects `None` and loses
        assert!(!store.update_trigger_state(a.id, None, claim).await.unwrap());

        let stored = store.alert(a.id).unwrap().unwrap();
        assert_eq!(stored.last_triggered, Some(10));
        assert!(!stored.is_active);
        assert!(store.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let a = AlertStore::create(&store, "u1", new_alert()).await.unwrap();

        assert!(matches!(
            AlertStore::delete(&store, a.id, "u2").await,
            Err(StoreError::NotFound)
        ));
        AlertStore::delete(&store, a.id, "u1").await.unwrap();
        assert!(store.alert(a.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn watchlist_rejects_duplicates_case_insensitively() {
        let store = MemoryStore::new();
        store.add("u1", "aapl", "Apple").await.unwrap();

        assert!(matches!(
            store.add("u1", " AAPL ", "Apple").await,
            Err(StoreError::AlreadyExists)
        ));
        // another user may watch the same symbol
        store.add("u2", "AAPL", "Apple").await.unwrap();

        assert_eq!(WatchlistStore::list_by_user(&store, "u1").await.unwrap().len(), 1);
    }
}
