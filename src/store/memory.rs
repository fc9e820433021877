// src/store/memory.rs
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::PersistError;
use crate::ingest::types::{Source, TrendRecord};
use crate::store::SnapshotStore;

/// In-process store with the same overwrite-by-source semantics as DynamoDB.
/// Backs the tests and `STORE_BACKEND=memory` runs.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<Source, TrendRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: Source) -> Option<TrendRecord> {
        self.rows
            .read()
            .ok()
            .and_then(|rows| rows.get(&source).cloned())
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows sorted by source, for stable assertions and dumps.
    pub fn snapshot(&self) -> Vec<TrendRecord> {
        let mut rows: Vec<TrendRecord> = self
            .rows
            .read()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|r| r.source);
        rows
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn upsert(&self, record: &TrendRecord) -> Result<(), PersistError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| PersistError::Fatal("memory store lock poisoned".to_string()))?;
        rows.insert(record.source, record.clone());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::TrendItem;
    use serde_json::json;

    fn rec(source: Source, v: serde_json::Value) -> TrendRecord {
        let items: Vec<TrendItem> = serde_json::from_value(v).unwrap();
        TrendRecord::new(source, items)
    }

    #[tokio::test]
    async fn upsert_twice_is_idempotent() {
        let store = MemoryStore::new();
        let r = rec(Source::Github, json!([{"name": "a/b"}]));
        store.upsert(&r).await.unwrap();
        let once = store.snapshot();
        store.upsert(&r).await.unwrap();
        assert_eq!(store.snapshot(), once);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn later_write_replaces_earlier_one() {
        let store = MemoryStore::new();
        store
            .upsert(&rec(Source::Github, json!([{"name": "old"}, {"name": "older"}])))
            .await
            .unwrap();
        store
            .upsert(&rec(Source::Github, json!([{"name": "new"}])))
            .await
            .unwrap();
        let row = store.get(Source::Github).unwrap();
        assert_eq!(row.items.len(), 1);
        assert_eq!(row.items[0]["name"], "new");
    }
}
