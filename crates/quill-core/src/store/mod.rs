//! Durable key-value storage seam plus built-in backends.
//!
//! Two identifiers outlive the process: the in-progress draft id and the
//! sticky default project id. Their key names are part of the on-device
//! contract and stable across versions.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Persisted key for the id of the in-progress draft.
pub const DRAFT_ID_KEY: &str = "DRAFT_ID_STORAGE_KEY";

/// Persisted key for the sticky default project id.
pub const DEFAULT_PROJECT_KEY: &str = "YT_DEFAULT_CREATE_PROJECT_ID_STORAGE";

/// Durable string-to-string storage surviving app restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; absent keys are `None`, not an error.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the backend itself fails.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the backend itself fails.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the backend itself fails.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store for tests, previews, and the simulator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
