//! JSON-file-backed record store
//!
//! One file per collection under a data directory, loaded eagerly on open
//! and rewritten on every mutation via temp-file rename. This is the direct
//! write path when the record API is unreachable, and the only path for
//! offline CLI use. An in-memory mode backs the test suite.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{record_id, Filter, RecordStore};
use crate::errors::{CoreError, Result};

type Collections = HashMap<String, BTreeMap<String, Value>>;

pub struct LocalStore {
    data: RwLock<Collections>,
    /// Data directory; None keeps everything in memory
    dir: Option<PathBuf>,
}

impl LocalStore {
    /// Open a store rooted at `dir`, loading any existing collection files
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut data: Collections = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            let records: Vec<Value> = serde_json::from_str(&text)
                .map_err(|e| CoreError::transient(format!("corrupt collection {name}: {e}")))?;
            let mut by_id = BTreeMap::new();
            for record in records {
                if let Some(id) = record_id(&record) {
                    by_id.insert(id.to_string(), record);
                }
            }
            data.insert(name.to_string(), by_id);
        }
        tracing::debug!(dir = %dir.display(), collections = data.len(), "Opened local store");
        Ok(Self {
            data: RwLock::new(data),
            dir: Some(dir.to_path_buf()),
        })
    }

    /// A store with no persistence, for tests and throwaway sessions
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            dir: None,
        }
    }

    /// Rewrite one collection file (temp file + rename)
    fn flush(&self, collection: &str, records: &BTreeMap<String, Value>) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let values: Vec<&Value> = records.values().collect();
        let text = serde_json::to_string_pretty(&values)?;
        let tmp = dir.join(format!(".{collection}.json.tmp"));
        let path = dir.join(format!("{collection}.json"));
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let data = self.data.read().await;
        Ok(data
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn find_by_filter(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        let data = self.data.read().await;
        Ok(data
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save(&self, collection: &str, mut record: Value) -> Result<Value> {
        if !record.is_object() {
            return Err(CoreError::validation("record must be a JSON object"));
        }
        let mut data = self.data.write().await;
        let records = data.entry(collection.to_string()).or_default();

        let now = Utc::now().to_rfc3339();
        let id = match record_id(&record) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record["id"] = Value::String(id.clone());
                id
            }
        };
        if record.get("created").and_then(Value::as_str).is_none() {
            record["created"] = Value::String(now.clone());
        }
        record["updated"] = Value::String(now);

        records.insert(id, record.clone());
        self.flush(collection, records)?;
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let records = data.entry(collection.to_string()).or_default();
        if records.remove(id).is_none() {
            return Err(CoreError::not_found("record", id));
        }
        self.flush(collection, records)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_assigns_id_and_timestamps() {
        let store = LocalStore::in_memory();
        let saved = store
            .save("tasks", json!({"title": "hello"}))
            .await
            .unwrap();
        let id = saved["id"].as_str().unwrap();
        assert!(!id.is_empty());
        assert!(saved["created"].is_string());
        assert!(saved["updated"].is_string());

        let found = store.find_by_id("tasks", id).await.unwrap().unwrap();
        assert_eq!(found["title"], "hello");
    }

    #[tokio::test]
    async fn test_save_preserves_existing_id() {
        let store = LocalStore::in_memory();
        let saved = store
            .save("tasks", json!({"id": "t1", "title": "a"}))
            .await
            .unwrap();
        assert_eq!(saved["id"], "t1");

        store
            .save("tasks", json!({"id": "t1", "title": "b"}))
            .await
            .unwrap();
        let found = store.find_by_id("tasks", "t1").await.unwrap().unwrap();
        assert_eq!(found["title"], "b");
    }

    #[tokio::test]
    async fn test_filter_by_field() {
        let store = LocalStore::in_memory();
        store
            .save("tasks", json!({"id": "a", "board": "b1"}))
            .await
            .unwrap();
        store
            .save("tasks", json!({"id": "b", "board": "b2"}))
            .await
            .unwrap();

        let hits = store
            .find_by_filter("tasks", &Filter::new().eq("board", "b1"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], "a");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = LocalStore::in_memory();
        assert!(matches!(
            store.delete("tasks", "ghost").await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store
                .save("boards", json!({"id": "b1", "name": "Work"}))
                .await
                .unwrap();
        }
        let reopened = LocalStore::open(dir.path()).unwrap();
        let found = reopened.find_by_id("boards", "b1").await.unwrap().unwrap();
        assert_eq!(found["name"], "Work");
    }
}
