use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub const POLLS: &str = "polls";
pub const OPTIONS: &str = "poll_options";
pub const VOTES: &str = "votes";

/// Address of one document: collection name plus its `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocKey {
    pub collection: &'static str,
    pub id: String,
}

impl DocKey {
    pub fn new(collection: &'static str, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

/// One write proposed as part of a transaction or batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a new document. Fails with `StoreError::Conflict` if a document
    /// already exists at the key.
    Create { key: DocKey, doc: Document },
    /// Merge fields into an existing document (`$set` semantics).
    Update { key: DocKey, fields: Document },
    /// Add `by` to an integer counter field of an existing document.
    Increment {
        key: DocKey,
        field: &'static str,
        by: i64,
    },
    /// Remove the document at the key, if present.
    Delete { key: DocKey },
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic conflict: a concurrent transaction touched a key this one
    /// read or tried to create. Retryable from the top of the transaction.
    #[error("write conflict")]
    Conflict,
    #[error("document encoding failed: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error("document decoding failed: {0}")]
    Decode(#[from] mongodb::bson::de::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// One isolated unit of work: read a bounded key set, then propose writes.
/// Reads and writes commit atomically; any concurrent conflicting commit
/// causes `propose_writes` to fail with `StoreError::Conflict`.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn read_keys(
        &mut self,
        keys: &[DocKey],
    ) -> Result<HashMap<DocKey, Document>, StoreError>;

    async fn propose_writes(self: Box<Self>, writes: Vec<WriteOp>) -> Result<(), StoreError>;
}

/// Capability contract for the persistent store: any backend offering
/// optimistic multi-key transactions can sit behind it.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Point read outside any transaction.
    async fn read_one(&self, key: &DocKey) -> Result<Option<Document>, StoreError>;

    /// Equality query on a single field, outside any transaction.
    async fn find_eq(
        &self,
        collection: &'static str,
        field: &str,
        value: Bson,
    ) -> Result<Vec<Document>, StoreError>;

    /// All documents of a collection, outside any transaction.
    async fn scan(&self, collection: &'static str) -> Result<Vec<Document>, StoreError>;

    /// Non-transactional batch of independently-idempotent writes (poll
    /// creation, cascade deletes). No cross-document isolation is implied.
    async fn apply(&self, writes: Vec<WriteOp>) -> Result<(), StoreError>;
}

pub fn to_doc<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    Ok(mongodb::bson::to_document(value)?)
}

pub fn from_doc<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(mongodb::bson::from_document(doc)?)
}
