use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::UploadResult;

/// Keyed document persistence
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or replace the document `key` in `collection`
    async fn write(&self, collection: &str, key: &str, document: Value) -> UploadResult<()>;
}

/// In-memory document store
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<BTreeMap<String, BTreeMap<String, Value>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<Value> {
        self.collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    /// Typed read; `None` when missing or not shaped like `T`
    pub fn get_as<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Option<T> {
        self.get(collection, key)
            .and_then(|doc| serde_json::from_value(doc).ok())
    }

    pub fn keys(&self, collection: &str) -> Vec<String> {
        self.collections
            .read()
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |docs| docs.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn write(&self, collection: &str, key: &str, document: Value) -> UploadResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_are_scoped_by_collection() {
        let store = MemoryDocumentStore::new();
        store.write("uploadedFile", "a1", json!({"fileName": "a.txt"})).await.unwrap();
        store.write("other", "a1", json!({"x": 1})).await.unwrap();

        assert_eq!(store.len("uploadedFile"), 1);
        assert_eq!(store.get("uploadedFile", "a1").unwrap()["fileName"], "a.txt");
        assert_eq!(store.get("other", "a1").unwrap()["x"], 1);
        assert!(store.get("uploadedFile", "missing").is_none());
        assert_eq!(store.len("empty"), 0);
    }

    #[tokio::test]
    async fn write_replaces_existing_key() {
        let store = MemoryDocumentStore::new();
        store.write("c", "k", json!({"v": 1})).await.unwrap();
        store.write("c", "k", json!({"v": 2})).await.unwrap();

        assert_eq!(store.keys("c"), vec!["k".to_string()]);
        assert_eq!(store.get_as::<Value>("c", "k").unwrap()["v"], 2);
    }
}
