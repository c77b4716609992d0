//! User registry repository.
//!
//! Every message touches the sender. Unchanged profiles seen recently are
//! not rewritten to disk.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::database::models::{Profile, UserRecord};
use crate::storage::{JsonStore, StorageError, Write};

/// How stale `last_seen` may get before an unchanged profile is rewritten.
const LAST_SEEN_GRANULARITY_SECS: i64 = 300;

/// Repository for known users.
pub struct UserRepository {
    store: JsonStore<BTreeMap<u64, UserRecord>>,
    clock: Arc<dyn Clock>,
}

impl UserRepository {
    pub fn open(
        path: impl Into<PathBuf>,
        lock_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            store: JsonStore::open("users", path, lock_timeout)?,
            clock,
        })
    }

    /// Upsert a user. Returns `true` for a first-time user.
    pub fn touch(&self, profile: Profile) -> Result<bool, StorageError> {
        self.touch_at(profile, self.clock.now())
    }

    pub fn touch_at(&self, profile: Profile, now: DateTime<Utc>) -> Result<bool, StorageError> {
        let user_id = profile.user_id;
        let is_new = self.store.transact(|users| match users.get_mut(&user_id) {
            Some(record) => {
                let stale = (now - record.last_seen).num_seconds() >= LAST_SEEN_GRANULARITY_SECS;
                if !record.has_changed(&profile) && !stale {
                    return (false, Write::Skip);
                }
                record.username = profile.username;
                record.first_name = profile.first_name;
                record.language_code = profile.language_code;
                record.last_seen = now;
                (false, Write::Persist)
            }
            None => {
                users.insert(user_id, UserRecord::new(profile, now));
                (true, Write::Persist)
            }
        })?;

        if is_new {
            debug!("Registered new user {}", user_id);
        }
        Ok(is_new)
    }

    /// Count a completed download.
    pub fn record_download(&self, user_id: u64) -> Result<(), StorageError> {
        self.store.transact(|users| match users.get_mut(&user_id) {
            Some(record) => {
                record.downloads += 1;
                ((), Write::Persist)
            }
            None => ((), Write::Skip),
        })
    }

    pub fn get(&self, user_id: u64) -> Result<Option<UserRecord>, StorageError> {
        self.store.read(|users| users.get(&user_id).cloned())
    }

    /// Every registered user id (broadcast targets).
    pub fn all_ids(&self) -> Result<Vec<u64>, StorageError> {
        self.store.read(|users| users.keys().copied().collect())
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        self.store.read(|users| users.len())
    }

    /// Users seen at or after `since`.
    pub fn active_since(&self, since: DateTime<Utc>) -> Result<usize, StorageError> {
        self.store
            .read(|users| users.values().filter(|u| u.last_seen >= since).count())
    }

    /// Sum of completed downloads over all users.
    pub fn total_downloads(&self) -> Result<u64, StorageError> {
        self.store.read(|users| users.values().map(|u| u.downloads).sum())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::clock::SystemClock;
    use crate::storage::test_dir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn profile(id: u64, name: &str) -> Profile {
        Profile {
            user_id: id,
            username: Some(name.to_lowercase()),
            first_name: name.to_string(),
            language_code: Some("en".to_string()),
        }
    }

    fn repo() -> UserRepository {
        UserRepository::open(
            test_dir("users").join("users.json"),
            Duration::from_secs(1),
            Arc::new(SystemClock),
        )
        .unwrap()
    }

    #[test]
    fn touch_registers_then_updates() {
        let users = repo();

        assert!(users.touch_at(profile(1, "Alice"), at(0)).unwrap());
        assert!(!users.touch_at(profile(1, "Alicia"), at(10)).unwrap());

        let record = users.get(1).unwrap().unwrap();
        assert_eq!(record.first_name, "Alicia");
        assert_eq!(record.first_seen, at(0));
        assert_eq!(record.last_seen, at(10));
        assert_eq!(record.display_name(), "@alicia");
    }

    #[test]
    fn unchanged_recent_profile_is_not_rewritten() {
        let users = repo();
        users.touch_at(profile(1, "Bob"), at(0)).unwrap();

        users.touch_at(profile(1, "Bob"), at(60)).unwrap();
        assert_eq!(users.get(1).unwrap().unwrap().last_seen, at(0));

        users.touch_at(profile(1, "Bob"), at(600)).unwrap();
        assert_eq!(users.get(1).unwrap().unwrap().last_seen, at(600));
    }

    #[test]
    fn stats_queries() {
        let users = repo();
        users.touch_at(profile(1, "A"), at(0)).unwrap();
        users.touch_at(profile(2, "B"), at(1000)).unwrap();
        users.record_download(2).unwrap();
        users.record_download(2).unwrap();
        users.record_download(99).unwrap();

        assert_eq!(users.count().unwrap(), 2);
        assert_eq!(users.all_ids().unwrap(), vec![1, 2]);
        assert_eq!(users.active_since(at(1000) - ChronoDuration::seconds(1)).unwrap(), 1);
        assert_eq!(users.total_downloads().unwrap(), 2);
    }
}
