//! History channel model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A channel that receives a copy of every completed download.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryChannel {
    pub chat_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    /// Admin who added the channel; `None` for channels from config.
    #[serde(default)]
    pub added_by: Option<u64>,
    pub added_at: DateTime<Utc>,
}
