use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::Database;

use crate::{error::StoreError, models::UserContact};

// owned by the auth provider; read-only here
pub const USERS_COLLECTION: &str = "user";

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `None` when the user is unknown or has no email on file.
    async fn resolve_user_email(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    /// Every user with a deliverable email address.
    async fn list_users(&self) -> Result<Vec<UserContact>, StoreError>;
}

#[derive(Clone)]
pub struct MongoUserDirectory {
    db: Database,
}

impl MongoUserDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn user_id_of(d: &Document) -> Option<String> {
    match d.get("id") {
        Some(Bson::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => match d.get("_id") {
            Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
            Some(Bson::String(s)) => Some(s.clone()),
            _ => None,
        },
    }
}

fn contact_of(d: &Document) -> Option<UserContact> {
    let email = d.get_str("email").ok()?.trim();
    if email.is_empty() {
        return None;
    }

    Some(UserContact {
        id: user_id_of(d)?,
        email: email.to_string(),
        name: d.get_str("name").ok().map(str::to_string),
    })
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn resolve_user_email(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let users = self.db.collection::<Document>(USERS_COLLECTION);

        // provider ids live in `id`; older records only carry `_id`
        let mut any_of = vec![doc! { "id": user_id }];
        if let Ok(oid) = ObjectId::parse_str(user_id) {
            any_of.push(doc! { "_id": oid });
        }

        let found = users.find_one(doc! { "$or": any_of }, None).await?;

        Ok(found.as_ref().and_then(contact_of).map(|c| c.email))
    }

    async fn list_users(&self) -> Result<Vec<UserContact>, StoreError> {
        let users = self.db.collection::<Document>(USERS_COLLECTION);

        let mut cursor = users
            .find(doc! { "email": { "$exists": true, "$ne": null } }, None)
            .await?;

        let mut out = Vec::new();
        while let Some(res) = cursor.next().await {
            if let Some(c) = contact_of(&res?) {
                out.push(c);
            }
        }

        Ok(out)
    }
}
