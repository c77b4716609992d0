//! History channel repository.
//!
//! Channels from configuration are fixed; admins can add more at runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::clock::Clock;
use crate::database::models::HistoryChannel;
use crate::storage::{JsonStore, StorageError, Write};

/// Repository for history channels.
pub struct ChannelRepository {
    store: JsonStore<Vec<HistoryChannel>>,
    configured: Vec<i64>,
    clock: Arc<dyn Clock>,
}

impl ChannelRepository {
    pub fn open(
        path: impl Into<PathBuf>,
        configured: Vec<i64>,
        lock_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            store: JsonStore::open("channels", path, lock_timeout)?,
            configured,
            clock,
        })
    }

    /// Add a channel. Returns `false` if it is already a target.
    pub fn add(&self, chat_id: i64, title: Option<String>, added_by: u64) -> Result<bool, StorageError> {
        if self.configured.contains(&chat_id) {
            return Ok(false);
        }

        let now = self.clock.now();
        let added = self.store.transact(|channels| {
            if channels.iter().any(|c| c.chat_id == chat_id) {
                return (false, Write::Skip);
            }
            channels.push(HistoryChannel {
                chat_id,
                title,
                added_by: Some(added_by),
                added_at: now,
            });
            (true, Write::Persist)
        })?;

        if added {
            info!("History channel {} added by {}", chat_id, added_by);
        }
        Ok(added)
    }

    /// Remove a runtime channel. Channels from config cannot be removed.
    pub fn remove(&self, chat_id: i64) -> Result<bool, StorageError> {
        let removed = self.store.transact(|channels| {
            let before = channels.len();
            channels.retain(|c| c.chat_id != chat_id);
            if channels.len() == before {
                (false, Write::Skip)
            } else {
                (true, Write::Persist)
            }
        })?;

        if removed {
            info!("History channel {} removed", chat_id);
        }
        Ok(removed)
    }

    /// Whether the channel comes from configuration.
    pub fn is_configured(&self, chat_id: i64) -> bool {
        self.configured.contains(&chat_id)
    }

    /// Configured channels first, then runtime ones.
    pub fn list(&self) -> Result<Vec<HistoryChannel>, StorageError> {
        let stored = self.store.read(|channels| channels.clone())?;
        let now = self.clock.now();

        Ok(self
            .configured
            .iter()
            .map(|&chat_id| HistoryChannel {
                chat_id,
                title: None,
                added_by: None,
                added_at: now,
            })
            .chain(stored)
            .collect())
    }

    /// Chat ids that should receive download copies.
    pub fn all_targets(&self) -> Result<Vec<i64>, StorageError> {
        let mut targets = self.configured.clone();
        let stored = self.store.read(|channels| channels.iter().map(|c| c.chat_id).collect::<Vec<_>>())?;
        for chat_id in stored {
            if !targets.contains(&chat_id) {
                targets.push(chat_id);
            }
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage::test_dir;

    fn repo(configured: Vec<i64>) -> ChannelRepository {
        ChannelRepository::open(
            test_dir("channels").join("channels.json"),
            configured,
            Duration::from_secs(1),
            Arc::new(SystemClock),
        )
        .unwrap()
    }

    #[test]
    fn add_remove_and_targets() {
        let channels = repo(vec![-100]);

        assert!(channels.add(-200, Some("Archive".to_string()), 1).unwrap());
        assert!(!channels.add(-200, None, 1).unwrap());
        assert!(!channels.add(-100, None, 1).unwrap());

        assert_eq!(channels.all_targets().unwrap(), vec![-100, -200]);
        assert_eq!(channels.list().unwrap().len(), 2);
        assert!(channels.is_configured(-100));

        assert!(!channels.remove(-100).unwrap());
        assert!(channels.remove(-200).unwrap());
        assert_eq!(channels.all_targets().unwrap(), vec![-100]);
    }
}
