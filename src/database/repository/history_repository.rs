//! Download history repository.
//!
//! Bounded per-user lists, most recent first.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::database::models::{DownloadHistoryEntry, HISTORY_CAP};
use crate::storage::{JsonStore, StorageError, Write};

/// Repository for per-user download history.
pub struct HistoryRepository {
    store: JsonStore<BTreeMap<u64, Vec<DownloadHistoryEntry>>>,
}

impl HistoryRepository {
    pub fn open(path: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self, StorageError> {
        Ok(Self {
            store: JsonStore::open("history", path, lock_timeout)?,
        })
    }

    /// Prepend an entry, dropping the oldest beyond the cap.
    pub fn add(&self, user_id: u64, entry: DownloadHistoryEntry) -> Result<(), StorageError> {
        self.store.update(|history| {
            let list = history.entry(user_id).or_default();
            list.insert(0, entry);
            list.truncate(HISTORY_CAP);
        })?;
        debug!("History entry added for user {}", user_id);
        Ok(())
    }

    /// Up to `limit` most recent entries.
    pub fn list(&self, user_id: u64, limit: usize) -> Result<Vec<DownloadHistoryEntry>, StorageError> {
        self.store.read(|history| {
            history
                .get(&user_id)
                .map(|list| list.iter().take(limit).cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn count(&self, user_id: u64) -> Result<usize, StorageError> {
        self.store.read(|history| history.get(&user_id).map_or(0, Vec::len))
    }

    /// Remove a user's history. Returns the number of entries dropped.
    pub fn clear(&self, user_id: u64) -> Result<usize, StorageError> {
        self.store.transact(|history| match history.remove(&user_id) {
            Some(list) => (list.len(), Write::Persist),
            None => (0, Write::Skip),
        })
    }

    /// Entries across all users.
    pub fn total(&self) -> Result<usize, StorageError> {
        self.store.read(|history| history.values().map(Vec::len).sum())
    }
}
