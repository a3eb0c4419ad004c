use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use crate::{
    error::StoreError,
    models::{Alert, NewAlert, TriggerUpdate},
};

pub const ALERTS_COLLECTION: &str = "alerts";

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create(&self, user_id: &str, alert: NewAlert) -> Result<Alert, StoreError>;

    /// Deletes only when `user_id` owns the alert.
    async fn delete(&self, alert_id: ObjectId, user_id: &str) -> Result<(), StoreError>;

    /// Active alerts of one user, newest first.
    async fn list_by_user(&self, user_id: &str, symbol: Option<&str>) -> Result<Vec<Alert>, StoreError>;

    async fn list_active(&self) -> Result<Vec<Alert>, StoreError>;

    /// Applies `update` only while the stored `last_triggered` still equals
    /// `expected_last_triggered`. Returns whether the write applied.
    async fn update_trigger_state(
        &self,
        alert_id: ObjectId,
        expected_last_triggered: Option<i64>,
        update: TriggerUpdate,
    ) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct MongoAlertStore {
    db: Database,
}

impl MongoAlertStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn raw(&self) -> Collection<Document> {
        self.db.collection::<Document>(ALERTS_COLLECTION)
    }

    async fn find_alerts(&self, filter: Document) -> Result<Vec<Alert>, StoreError> {
        let find_opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        let mut cursor = self.raw().find(filter, find_opts).await?;

        let mut items: Vec<Alert> = Vec::new();
        while let Some(res) = cursor.next().await {
            let raw = res?;
            // one bad document must not hide every other alert
            match bson::from_document::<Alert>(raw) {
                Ok(a) => items.push(a),
                Err(e) => tracing::warn!(error = %e, "skipping malformed alert document"),
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl AlertStore for MongoAlertStore {
    async fn create(&self, user_id: &str, alert: NewAlert) -> Result<Alert, StoreError> {
        let alert = alert.into_alert(user_id, Utc::now().timestamp());

        self.db
            .collection::<Alert>(ALERTS_COLLECTION)
            .insert_one(&alert, None)
            .await?;

        Ok(alert)
    }

    async fn delete(&self, alert_id: ObjectId, user_id: &str) -> Result<(), StoreError> {
        let res = self
            .raw()
            .delete_one(doc! { "_id": alert_id, "user_id": user_id }, None)
            .await?;

        if res.deleted_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str, symbol: Option<&str>) -> Result<Vec<Alert>, StoreError> {
        let mut filter = doc! { "user_id": user_id, "is_active": true };
        if let Some(sym) = symbol {
            filter.insert("symbol", sym.trim().to_uppercase());
        }

        self.find_alerts(filter).await
    }

    async fn list_active(&self) -> Result<Vec<Alert>, StoreError> {
        self.find_alerts(doc! { "is_active": true }).await
    }

    async fn update_trigger_state(
        &self,
        alert_id: ObjectId,
        expected_last_triggered: Option<i64>,
        update: TriggerUpdate,
    ) -> Result<bool, StoreError> {
        // null also matches a missing field, same as a never-triggered alert
        let res = self
            .raw()
            .update_one(
                doc! { "_id": alert_id, "last_triggered": expected_last_triggered },
                doc! { "$set": {
                    "last_triggered": update.last_triggered,
                    "is_active": update.is_active,
                    "updated_at": Utc::now().timestamp(),
                } },
                None,
            )
            .await?;

        Ok(res.matched_count > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
