use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use crate::{
    error::{StoreError, ValidationError},
    models::{normalize_symbol, WatchlistEntry},
};

pub const WATCHLIST_COLLECTION: &str = "watchlist";

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// `AlreadyExists` when the user already watches the symbol.
    async fn add(&self, user_id: &str, symbol: &str, company: &str) -> Result<WatchlistEntry, StoreError>;

    /// `NotFound` when the symbol is not on the user's list.
    async fn remove(&self, user_id: &str, symbol: &str) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchlistEntry>, StoreError>;
}

/// Shared input rules for every watchlist backend.
pub fn new_entry(user_id: &str, symbol: &str, company: &str) -> Result<WatchlistEntry, StoreError> {
    let symbol = normalize_symbol(symbol)?;
    let company = company.trim();
    if company.is_empty() {
        return Err(ValidationError::MissingField { field: "company" }.into());
    }

    Ok(WatchlistEntry {
        id: ObjectId::new(),
        user_id: user_id.to_string(),
        symbol,
        company: company.to_string(),
        added_at: Utc::now().timestamp(),
    })
}

#[derive(Clone)]
pub struct MongoWatchlistStore {
    db: Database,
}

impl MongoWatchlistStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn col(&self) -> Collection<WatchlistEntry> {
        self.db.collection::<WatchlistEntry>(WATCHLIST_COLLECTION)
    }
}

#[async_trait]
impl WatchlistStore for MongoWatchlistStore {
    async fn add(&self, user_id: &str, symbol: &str, company: &str) -> Result<WatchlistEntry, StoreError> {
        let entry = new_entry(user_id, symbol, company)?;
        let col = self.col();

        if col
            .find_one(doc! { "user_id": user_id, "symbol": &entry.symbol }, None)
            .await?
            .is_some()
        {
            return Err(StoreError::AlreadyExists);
        }

        // the unique index still catches a concurrent insert (E11000 => AlreadyExists)
        col.insert_one(&entry, None).await?;

        Ok(entry)
    }

    async fn remove(&self, user_id: &str, symbol: &str) -> Result<(), StoreError> {
        let sym = normalize_symbol(symbol)?;

        let res = self
            .col()
            .delete_one(doc! { "user_id": user_id, "symbol": &sym }, None)
            .await?;

        if res.deleted_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<WatchlistEntry>, StoreError> {
        let find_opts = FindOptions::builder().sort(doc! { "added_at": -1 }).build();

        let mut cursor = self.col().find(doc! { "user_id": user_id }, find_opts).await?;

        let mut items: Vec<WatchlistEntry> = Vec::new();
        while let Some(res) = cursor.next().await {
            items.push(res?);
        }

        Ok(items)
    }
}
