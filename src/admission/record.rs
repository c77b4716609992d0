//! Per-user rate limit record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the longest counting window in seconds; older timestamps are pruned.
pub const RETENTION_SECS: i64 = 86_400;

/// Rate limit bookkeeping for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Timestamps of admitted requests within the last 24 hours
    #[serde(default)]
    pub requests: Vec<DateTime<Utc>>,

    /// Window violations since the last admin reset
    #[serde(default)]
    pub violations: u32,

    /// End of the long ban, if any
    #[serde(default)]
    pub ban_until: Option<DateTime<Utc>>,

    /// End of the temporary ban, if any
    #[serde(default)]
    pub temp_ban_until: Option<DateTime<Utc>>,

    /// Last attempt that reached the throttle checks
    #[serde(default)]
    pub last_request: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    /// Drop timestamps older than [`RETENTION_SECS`] and clear expired bans.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let retention = Duration::seconds(RETENTION_SECS);
        self.requests.retain(|&t| now - t < retention);

        if self.ban_until.is_some_and(|until| until <= now) {
            self.ban_until = None;
        }
        if self.temp_ban_until.is_some_and(|until| until <= now) {
            self.temp_ban_until = None;
        }
    }

    /// Requests inside the trailing `window`.
    pub fn count_within(&self, window: Duration, now: DateTime<Utc>) -> usize {
        self.requests.iter().filter(|&&t| now - t < window).count()
    }

    /// Oldest request inside the trailing `window`.
    pub fn oldest_within(&self, window: Duration, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.requests
            .iter()
            .copied()
            .filter(|&t| now - t < window)
            .min()
    }

    /// Whether the record carries nothing worth keeping.
    pub fn is_clear(&self) -> bool {
        self.requests.is_empty()
            && self.violations == 0
            && self.ban_until.is_none()
            && self.temp_ban_until.is_none()
    }
}
