//! Session state types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::downloader::Platform;

/// What a user is in the middle of doing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing pending
    #[default]
    Idle,

    /// Next message is a URL to download; `None` means auto-detect
    AwaitingUrl { platform: Option<Platform> },

    /// Next message is the body of a broadcast (admins only)
    AwaitingBroadcast,

    /// Broadcast body received, waiting for the confirm button
    AwaitingBroadcastConfirm { message: String },

    /// Next message is a channel id to add as history channel
    AwaitingChannelId,
}

/// Stored session for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub state: SessionState,

    /// Free-form payload, merged key by key on every write
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Time of the last write
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Whether the record is older than `ttl` at `now`.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.updated_at > ttl
    }
}

/// Session as seen by handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub state: SessionState,
    pub data: Map<String, Value>,
}

impl Session {
    /// Read an integer from the payload.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }
}

impl From<&SessionRecord> for Session {
    fn from(record: &SessionRecord) -> Self {
        Self {
            state: record.state.clone(),
            data: record.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_as_tagged_object() {
        let state = SessionState::AwaitingUrl {
            platform: Some(Platform::TikTok),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "awaiting_url", "platform": "tiktok" }));

        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
