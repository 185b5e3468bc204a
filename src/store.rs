use anyhow::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::log_store_operation;

/// Key namespaces used in the durable store
pub mod keys {
    pub const PROGRESS: &str = "quiz_streak_data";
    pub const LEADERBOARD: &str = "quiz_leaderboard";
    pub const BOOKMARKS: &str = "saved_questions";
    pub const DISPLAY_NAME: &str = "quiz_username";

    /// In-progress attempt for one quiz
    pub fn session(quiz_id: &str) -> String {
        format!("quiz_{}", quiz_id)
    }
}

/// Durable key-value storage with string keys and JSON string values.
///
/// Each call completes atomically from the caller's perspective; concurrent
/// writers to the same key resolve as last-writer-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON record.
///
/// A record that fails to parse is treated as absent.
pub async fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log_store_operation!(warn, "read_json", key = key, error = e, "ignoring unparseable record");
            Ok(None)
        }
    }
}

/// Like `read_json`, but a failing backend read also degrades to "absent"
pub async fn read_json_or_none<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match read_json(store, key).await {
        Ok(value) => value,
        Err(e) => {
            log_store_operation!(warn, "read_json", key = key, error = e, "store read failed, using defaults");
            None
        }
    }
}

pub async fn write_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await.inspect_err(|e| {
        log_store_operation!(error, "write_json", key = key, error = e);
    })
}

/// Process-local store, also the substitute backend in tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        log_store_operation!(debug, "set", key = key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        log_store_operation!(debug, "delete", key = key);
        Ok(())
    }
}
