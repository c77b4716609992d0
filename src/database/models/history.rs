//! Download history model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::downloader::{MediaKind, Platform};

/// Maximum history entries kept per user.
pub const HISTORY_CAP: usize = 100;

/// One completed download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadHistoryEntry {
    pub url: String,
    pub platform: Platform,
    #[serde(default)]
    pub title: Option<String>,
    pub media_type: MediaKind,
    pub downloaded_at: DateTime<Utc>,
}
