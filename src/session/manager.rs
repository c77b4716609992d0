//! Session manager with lazy expiry.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Session, SessionRecord, SessionState};
use crate::clock::Clock;
use crate::storage::{JsonStore, StorageError, Write};

type Records = BTreeMap<u64, SessionRecord>;

/// Per-user session store.
///
/// Expired sessions are not swept; they read back as idle and are deleted
/// from the store on that read.
pub struct SessionManager {
    store: JsonStore<Records>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn open(
        path: impl Into<PathBuf>,
        ttl: StdDuration,
        lock_timeout: StdDuration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            store: JsonStore::open("sessions", path, lock_timeout)?,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::hours(1)),
            clock,
        })
    }

    /// Set the state and merge `data` into the payload.
    pub fn set_state(
        &self,
        user_id: u64,
        state: SessionState,
        data: Map<String, Value>,
    ) -> Result<(), StorageError> {
        self.set_state_at(user_id, state, data, self.clock.now())
    }

    pub fn set_state_at(
        &self,
        user_id: u64,
        state: SessionState,
        data: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let ttl = self.ttl;
        self.store.update(|records| {
            // A stale payload must not leak into a new flow.
            let mut payload = match records.remove(&user_id) {
                Some(old) if !old.is_expired(ttl, now) => old.data,
                _ => Map::new(),
            };
            payload.extend(data);

            debug!("Session for user {} -> {:?}", user_id, state);
            records.insert(
                user_id,
                SessionRecord {
                    state,
                    data: payload,
                    updated_at: now,
                },
            );
        })
    }

    /// Current state, `Idle` if absent or expired.
    pub fn get_state(&self, user_id: u64) -> Result<SessionState, StorageError> {
        self.get_state_at(user_id, self.clock.now())
    }

    pub fn get_state_at(&self, user_id: u64, now: DateTime<Utc>) -> Result<SessionState, StorageError> {
        Ok(self.get_session_at(user_id, now)?.state)
    }

    /// Current session, the default idle session if absent or expired.
    pub fn get_session(&self, user_id: u64) -> Result<Session, StorageError> {
        self.get_session_at(user_id, self.clock.now())
    }

    pub fn get_session_at(&self, user_id: u64, now: DateTime<Utc>) -> Result<Session, StorageError> {
        let ttl = self.ttl;
        self.store.transact(|records| match records.get(&user_id) {
            Some(record) if record.is_expired(ttl, now) => {
                records.remove(&user_id);
                debug!("Session for user {} expired", user_id);
                (Session::default(), Write::Persist)
            }
            Some(record) => (Session::from(record), Write::Skip),
            None => (Session::default(), Write::Skip),
        })
    }

    /// Delete the session. Returns `false` if there was none.
    pub fn clear_state(&self, user_id: u64) -> Result<bool, StorageError> {
        self.store.transact(|records| match records.remove(&user_id) {
            Some(_) => (true, Write::Persist),
            None => (false, Write::Skip),
        })
    }

    /// Number of stored records, expired ones included.
    pub fn stored(&self) -> Result<usize, StorageError> {
        self.store.read(|records| records.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::downloader::Platform;
    use crate::storage::test_dir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn manager_at(path: &std::path::Path) -> SessionManager {
        SessionManager::open(
            path,
            StdDuration::from_secs(3600),
            StdDuration::from_secs(1),
            Arc::new(SystemClock),
        )
        .unwrap()
    }

    fn manager() -> SessionManager {
        manager_at(&test_dir("session").join("sessions.json"))
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_session_is_idle() {
        let sessions = manager();
        assert_eq!(sessions.get_state_at(1, at(0)).unwrap(), SessionState::Idle);
        assert_eq!(sessions.get_session_at(1, at(0)).unwrap(), Session::default());
    }

    #[test]
    fn writes_merge_payload() {
        let sessions = manager();
        let state = SessionState::AwaitingUrl {
            platform: Some(Platform::YouTube),
        };

        sessions.set_state_at(1, state.clone(), data(json!({ "a": 1 })), at(0)).unwrap();
        sessions.set_state_at(1, state.clone(), data(json!({ "b": 2 })), at(1)).unwrap();

        let session = sessions.get_session_at(1, at(2)).unwrap();
        assert_eq!(session.state, state);
        assert_eq!(session.get_i64("a"), Some(1));
        assert_eq!(session.get_i64("b"), Some(2));
    }

    #[test]
    fn later_write_overrides_same_key() {
        let sessions = manager();
        sessions.set_state_at(1, SessionState::AwaitingBroadcast, data(json!({ "a": 1 })), at(0)).unwrap();
        sessions.set_state_at(1, SessionState::AwaitingBroadcast, data(json!({ "a": 5 })), at(1)).unwrap();

        assert_eq!(sessions.get_session_at(1, at(2)).unwrap().get_i64("a"), Some(5));
    }

    #[test]
    fn expired_session_reads_idle_and_is_removed_from_disk() {
        let path = test_dir("session").join("sessions.json");
        let sessions = manager_at(&path);

        sessions.set_state_at(1, SessionState::AwaitingBroadcast, Map::new(), at(0)).unwrap();
        assert_eq!(
            sessions.get_state_at(1, at(3600)).unwrap(),
            SessionState::AwaitingBroadcast
        );

        assert_eq!(sessions.get_state_at(1, at(3601)).unwrap(), SessionState::Idle);

        let on_disk: Records = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!on_disk.contains_key(&1));
    }

    #[test]
    fn expired_payload_is_not_merged() {
        let sessions = manager();
        sessions.set_state_at(1, SessionState::AwaitingBroadcast, data(json!({ "a": 1 })), at(0)).unwrap();
        sessions.set_state_at(1, SessionState::AwaitingChannelId, data(json!({ "b": 2 })), at(4000)).unwrap();

        let session = sessions.get_session_at(1, at(4001)).unwrap();
        assert_eq!(session.get_i64("a"), None);
        assert_eq!(session.get_i64("b"), Some(2));
    }

    #[test]
    fn clear_then_get_returns_default() {
        let sessions = manager();
        sessions.set_state_at(1, SessionState::AwaitingChannelId, data(json!({ "x": 1 })), at(0)).unwrap();

        assert!(sessions.clear_state(1).unwrap());
        assert_eq!(sessions.get_session_at(1, at(1)).unwrap(), Session::default());
        assert!(!sessions.clear_state(1).unwrap());
    }

    #[test]
    fn users_do_not_share_sessions() {
        let sessions = manager();
        sessions.set_state_at(1, SessionState::AwaitingBroadcast, Map::new(), at(0)).unwrap();

        assert_eq!(sessions.get_state_at(2, at(1)).unwrap(), SessionState::Idle);
    }

    #[test]
    fn injected_clock_drives_expiry() {
        let clock = Arc::new(ManualClock::new(at(0)));
        let sessions = SessionManager::open(
            test_dir("session").join("sessions.json"),
            StdDuration::from_secs(60),
            StdDuration::from_secs(1),
            clock.clone(),
        )
        .unwrap();

        sessions.set_state(1, SessionState::AwaitingBroadcast, Map::new()).unwrap();
        clock.advance(Duration::seconds(30));
        assert_eq!(sessions.get_state(1).unwrap(), SessionState::AwaitingBroadcast);

        clock.advance(Duration::seconds(31));
        assert_eq!(sessions.get_state(1).unwrap(), SessionState::Idle);
        assert_eq!(sessions.stored().unwrap(), 0);
    }
}
