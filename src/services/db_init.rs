use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Database, IndexModel,
};

use crate::error::StoreError;

use super::{alerts_service::ALERTS_COLLECTION, watchlist_service::WATCHLIST_COLLECTION};

pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    // watchlist: unique per (user_id, symbol)
    {
        let col = db.collection::<Document>(WATCHLIST_COLLECTION);
        let model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "symbol": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        col.create_index(model, None).await?;
    }

    // alerts: per-user listings, the evaluator scan, and trigger history
    {
        let col = db.collection::<Document>(ALERTS_COLLECTION);
        let models = vec![
            IndexModel::builder().keys(doc! { "user_id": 1, "symbol": 1 }).build(),
            IndexModel::builder().keys(doc! { "user_id": 1, "is_active": 1 }).build(),
            IndexModel::builder().keys(doc! { "last_triggered": 1 }).build(),
        ];

        col.create_indexes(models, None).await?;
    }

    tracing::info!("mongo indexes ensured");
    Ok(())
}
