use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR};
use mongodb::{Client, ClientSession, Database};

use super::{DocKey, StoreError, StoreTransaction, TransactionalStore, WriteOp};

const DUPLICATE_KEY: i32 = 11000;
const WRITE_CONFLICT: i32 = 112;

fn is_conflict(err: &mongodb::error::Error) -> bool {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return true;
    }
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(we)) => {
            we.code == DUPLICATE_KEY || we.code == WRITE_CONFLICT
        }
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY || ce.code == WRITE_CONFLICT,
        _ => false,
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_conflict(&err) {
            StoreError::Conflict
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

/// MongoDB-backed store. Multi-document atomicity comes from client-session
/// transactions; duplicate-key and write-conflict server errors surface as
/// `StoreError::Conflict` so the ledger's retry loop can re-run the protocol.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }
}

struct MongoTransaction {
    session: ClientSession,
    db: Database,
}

impl MongoTransaction {
    async fn execute(&mut self, write: WriteOp) -> Result<(), mongodb::error::Error> {
        match write {
            WriteOp::Create { key, mut doc } => {
                doc.insert("_id", key.id);
                self.db
                    .collection::<Document>(key.collection)
                    .insert_one(doc)
                    .session(&mut self.session)
                    .await?;
            }
            WriteOp::Update { key, fields } => {
                self.db
                    .collection::<Document>(key.collection)
                    .update_one(doc! { "_id": key.id }, doc! { "$set": fields })
                    .session(&mut self.session)
                    .await?;
            }
            WriteOp::Increment { key, field, by } => {
                self.db
                    .collection::<Document>(key.collection)
                    .update_one(doc! { "_id": key.id }, doc! { "$inc": { field: by } })
                    .session(&mut self.session)
                    .await?;
            }
            WriteOp::Delete { key } => {
                self.db
                    .collection::<Document>(key.collection)
                    .delete_one(doc! { "_id": key.id })
                    .session(&mut self.session)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MongoTransaction {
    async fn read_keys(
        &mut self,
        keys: &[DocKey],
    ) -> Result<HashMap<DocKey, Document>, StoreError> {
        let mut found = HashMap::new();
        for key in keys {
            let doc = self
                .db
                .collection::<Document>(key.collection)
                .find_one(doc! { "_id": &key.id })
                .session(&mut self.session)
                .await?;
            if let Some(doc) = doc {
                found.insert(key.clone(), doc);
            }
        }
        Ok(found)
    }

    async fn propose_writes(self: Box<Self>, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut tx = *self;
        for write in writes {
            if let Err(err) = tx.execute(write).await {
                let _ = tx.session.abort_transaction().await;
                return Err(err.into());
            }
        }
        tx.session.commit_transaction().await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for MongoStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(Box::new(MongoTransaction {
            session,
            db: self.db.clone(),
        }))
    }

    async fn read_one(&self, key: &DocKey) -> Result<Option<Document>, StoreError> {
        Ok(self
            .db
            .collection::<Document>(key.collection)
            .find_one(doc! { "_id": &key.id })
            .await?)
    }

    async fn find_eq(
        &self,
        collection: &'static str,
        field: &str,
        value: Bson,
    ) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(doc! { field: value })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn scan(&self, collection: &'static str) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(doc! {})
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn apply(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        for write in writes {
            match write {
                WriteOp::Create { key, mut doc } => {
                    doc.insert("_id", key.id);
                    self.db
                        .collection::<Document>(key.collection)
                        .insert_one(doc)
                        .await?;
                }
                WriteOp::Update { key, fields } => {
                    self.db
                        .collection::<Document>(key.collection)
                        .update_one(doc! { "_id": key.id }, doc! { "$set": fields })
                        .await?;
                }
                WriteOp::Increment { key, field, by } => {
                    self.db
                        .collection::<Document>(key.collection)
                        .update_one(doc! { "_id": key.id }, doc! { "$inc": { field: by } })
                        .await?;
                }
                WriteOp::Delete { key } => {
                    self.db
                        .collection::<Document>(key.collection)
                        .delete_one(doc! { "_id": key.id })
                        .await?;
                }
            }
        }
        Ok(())
    }
}
