//! In-memory [`ObjectStore`] for tests.
//!
//! Objects live in a `HashMap` behind `std::sync::RwLock`. Every operation
//! is counted, and individual operations can be made to fail, so tests can
//! assert exactly which storage calls a code path made.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{join_public_url, ObjectNotFound, ObjectStore};

/// Storage operations tracked by [`InMemoryObjectStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
    Presign,
}

/// A stored blob and the content type it was uploaded with.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub struct InMemoryObjectStore {
    public_base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
    calls: RwLock<HashMap<StoreOp, usize>>,
    failing: RwLock<HashSet<StoreOp>>,
}

impl InMemoryObjectStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            objects: RwLock::new(HashMap::new()),
            calls: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Place an object directly, as a client upload through a pre-signed URL would.
    pub fn insert(&self, key: &str, bytes: Vec<u8>, content_type: &str) {
        self.objects.write().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of times `op` has been attempted.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.read().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Make every future `op` fail with a simulated transient error.
    pub fn fail_operation(&self, op: StoreOp) {
        self.failing.write().unwrap().insert(op);
    }

    fn record(&self, op: StoreOp) -> Result<()> {
        *self.calls.write().unwrap().entry(op).or_insert(0) += 1;
        if self.failing.read().unwrap().contains(&op) {
            bail!("simulated {:?} failure", op);
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.record(StoreOp::Get)?;
        self.objects
            .read()
            .unwrap()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| {
                ObjectNotFound {
                    key: key.to_string(),
                }
                .into()
            })
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.record(StoreOp::Put)?;
        self.insert(key, body, content_type);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.record(StoreOp::Delete)?;
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    fn presign_put(&self, key: &str, expires_in_secs: u64) -> Result<String> {
        self.record(StoreOp::Presign)?;
        Ok(format!("memory://upload/{}?expires={}", key, expires_in_secs))
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryObjectStore::new("https://cdn.test");
        store
            .put_object("gallery/a.webp", vec![1, 2, 3], "image/webp")
            .await
            .unwrap();
        assert_eq!(store.get_object("gallery/a.webp").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(store.object("gallery/a.webp").unwrap().content_type, "image/webp");

        store.delete_object("gallery/a.webp").await.unwrap();
        let err = store.get_object("gallery/a.webp").await.unwrap_err();
        assert!(err.downcast_ref::<ObjectNotFound>().is_some());
        assert_eq!(store.calls(StoreOp::Get), 2);
    }

    #[tokio::test]
    async fn test_failing_operation_is_counted() {
        let store = InMemoryObjectStore::new("https://cdn.test");
        store.fail_operation(StoreOp::Delete);
        assert!(store.delete_object("x").await.is_err());
        assert_eq!(store.calls(StoreOp::Delete), 1);
    }
}
