use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use super::{DocKey, StoreError, StoreTransaction, TransactionalStore, WriteOp};

#[derive(Default)]
struct Inner {
    docs: HashMap<DocKey, Document>,
    // Monotonic per-key version counter; bumped on every write including
    // deletes, so a reader that observed any earlier state will conflict.
    versions: HashMap<DocKey, u64>,
}

impl Inner {
    fn version(&self, key: &DocKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &DocKey) {
        *self.versions.entry(key.clone()).or_insert(0) += 1;
    }

    fn apply(&mut self, write: WriteOp) -> Result<(), StoreError> {
        match write {
            WriteOp::Create { key, doc } => {
                if self.docs.contains_key(&key) {
                    return Err(StoreError::Conflict);
                }
                self.docs.insert(key.clone(), doc);
                self.bump(&key);
            }
            WriteOp::Update { key, fields } => {
                let doc = self.docs.get_mut(&key).ok_or_else(|| {
                    StoreError::Backend(format!(
                        "update on missing document {}/{}",
                        key.collection, key.id
                    ))
                })?;
                for (field, value) in fields {
                    doc.insert(field, value);
                }
                self.bump(&key);
            }
            WriteOp::Increment { key, field, by } => {
                let doc = self.docs.get_mut(&key).ok_or_else(|| {
                    StoreError::Backend(format!(
                        "increment on missing document {}/{}",
                        key.collection, key.id
                    ))
                })?;
                let current = match doc.get(field) {
                    None => 0,
                    Some(Bson::Int32(v)) => i64::from(*v),
                    Some(Bson::Int64(v)) => *v,
                    Some(other) => {
                        return Err(StoreError::Backend(format!(
                            "field {field} is not a counter: {other:?}"
                        )))
                    }
                };
                doc.insert(field, Bson::Int64(current + by));
                self.bump(&key);
            }
            WriteOp::Delete { key } => {
                if self.docs.remove(&key).is_some() {
                    self.bump(&key);
                }
            }
        }
        Ok(())
    }
}

/// In-process store with per-key versioned optimistic concurrency. Backs the
/// test suite and the `STORE_BACKEND=memory` local-development mode.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTransaction {
    inner: Arc<Mutex<Inner>>,
    read_set: HashMap<DocKey, u64>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn read_keys(
        &mut self,
        keys: &[DocKey],
    ) -> Result<HashMap<DocKey, Document>, StoreError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let mut found = HashMap::new();
        for key in keys {
            self.read_set.insert(key.clone(), inner.version(key));
            if let Some(doc) = inner.docs.get(key) {
                found.insert(key.clone(), doc.clone());
            }
        }
        Ok(found)
    }

    async fn propose_writes(self: Box<Self>, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        for (key, version) in &self.read_set {
            if inner.version(key) != *version {
                return Err(StoreError::Conflict);
            }
        }
        // Validate before mutating so a rejected batch leaves no partial state.
        for write in &writes {
            match write {
                WriteOp::Create { key, .. } if inner.docs.contains_key(key) => {
                    return Err(StoreError::Conflict);
                }
                WriteOp::Increment { key, .. } | WriteOp::Update { key, .. }
                    if !inner.docs.contains_key(key) =>
                {
                    return Err(StoreError::Backend(format!(
                        "write to missing document {}/{}",
                        key.collection, key.id
                    )));
                }
                _ => {}
            }
        }
        for write in writes {
            inner.apply(write)?;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            read_set: HashMap::new(),
        }))
    }

    async fn read_one(&self, key: &DocKey) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.docs.get(key).cloned())
    }

    async fn find_eq(
        &self,
        collection: &'static str,
        field: &str,
        value: Bson,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .docs
            .iter()
            .filter(|(key, doc)| key.collection == collection && doc.get(field) == Some(&value))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn scan(&self, collection: &'static str) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .docs
            .iter()
            .filter(|(key, _)| key.collection == collection)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn apply(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        for write in writes {
            inner.apply(write)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn key(id: &str) -> DocKey {
        DocKey::new("polls", id)
    }

    #[tokio::test]
    async fn stale_read_is_rejected() {
        let store = MemoryStore::new();
        store
            .apply(vec![WriteOp::Create {
                key: key("p1"),
                doc: doc! { "total_votes": 0_i64 },
            }])
            .await
            .unwrap();

        let mut tx_a = store.begin().await.unwrap();
        let mut tx_b = store.begin().await.unwrap();
        tx_a.read_keys(&[key("p1")]).await.unwrap();
        tx_b.read_keys(&[key("p1")]).await.unwrap();

        tx_a.propose_writes(vec![WriteOp::Increment {
            key: key("p1"),
            field: "total_votes",
            by: 1,
        }])
        .await
        .unwrap();

        let err = tx_b
            .propose_writes(vec![WriteOp::Increment {
                key: key("p1"),
                field: "total_votes",
                by: 1,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        let doc = store.read_one(&key("p1")).await.unwrap().unwrap();
        assert_eq!(doc.get_i64("total_votes").unwrap(), 1);
    }

    #[tokio::test]
    async fn create_collision_is_a_conflict() {
        let store = MemoryStore::new();
        let mut tx_a = store.begin().await.unwrap();
        let mut tx_b = store.begin().await.unwrap();
        tx_a.read_keys(&[key("v1")]).await.unwrap();
        tx_b.read_keys(&[key("v1")]).await.unwrap();

        tx_a.propose_writes(vec![WriteOp::Create {
            key: key("v1"),
            doc: doc! { "who": "first" },
        }])
        .await
        .unwrap();

        let err = tx_b
            .propose_writes(vec![WriteOp::Create {
                key: key("v1"),
                doc: doc! { "who": "second" },
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        let doc = store.read_one(&key("v1")).await.unwrap().unwrap();
        assert_eq!(doc.get_str("who").unwrap(), "first");
    }

    #[tokio::test]
    async fn rejected_batch_leaves_no_partial_state() {
        let store = MemoryStore::new();
        store
            .apply(vec![WriteOp::Create {
                key: key("p1"),
                doc: doc! { "total_votes": 0_i64 },
            }])
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.read_keys(&[key("p1")]).await.unwrap();
        let err = tx
            .propose_writes(vec![
                WriteOp::Increment {
                    key: key("p1"),
                    field: "total_votes",
                    by: 1,
                },
                WriteOp::Increment {
                    key: key("missing"),
                    field: "total_votes",
                    by: 1,
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));

        let doc = store.read_one(&key("p1")).await.unwrap().unwrap();
        assert_eq!(doc.get_i64("total_votes").unwrap(), 0);
    }
}
