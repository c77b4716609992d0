//! Admission controller backed by the shared rate limit store.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::record::{RETENTION_SECS, RateLimitRecord};
use super::{Admission, AdmissionError, DenyReason, RateLimitConfig};
use crate::clock::Clock;
use crate::storage::{JsonStore, StorageError};

type Records = BTreeMap<u64, RateLimitRecord>;

/// Usage snapshot for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub minute: usize,
    pub hour: usize,
    pub day: usize,
    pub violations: u32,
    pub banned_for: Option<StdDuration>,
    pub temp_banned_for: Option<StdDuration>,
}

/// Per-user sliding-window rate limiter with progressive bans.
///
/// All users share one store and therefore one lock: a check for any user
/// is atomic with respect to every other check.
pub struct AdmissionController {
    store: JsonStore<Records>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Open the controller over the store file at `path`.
    pub fn open(
        path: impl Into<PathBuf>,
        config: RateLimitConfig,
        lock_timeout: StdDuration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            store: JsonStore::open("rate_limit", path, lock_timeout)?,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and record a request made now.
    pub fn check(&self, user_id: u64) -> Result<Admission, AdmissionError> {
        self.check_at(user_id, self.clock.now())
    }

    /// Check and record a request made at `now`.
    pub fn check_at(&self, user_id: u64, now: DateTime<Utc>) -> Result<Admission, AdmissionError> {
        let admission = self.store.update(|records| {
            let record = records.entry(user_id).or_default();
            record.prune(now);
            evaluate(&self.config, record, now)
        })?;

        match &admission {
            Admission::Allowed => debug!("Admitted request from user {}", user_id),
            Admission::Denied {
                reason,
                retry_after,
            } => info!(
                "Denied request from user {}: {} (retry after {}s)",
                user_id,
                reason,
                retry_after.as_secs()
            ),
        }

        Ok(admission)
    }

    /// Current usage for a user, without recording anything.
    pub fn status(&self, user_id: u64) -> Result<RateLimitStatus, AdmissionError> {
        self.status_at(user_id, self.clock.now())
    }

    pub fn status_at(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, AdmissionError> {
        let mut record = self
            .store
            .read(|records| records.get(&user_id).cloned())?
            .unwrap_or_default();
        record.prune(now);

        Ok(RateLimitStatus {
            minute: record.count_within(Duration::seconds(60), now),
            hour: record.count_within(Duration::hours(1), now),
            day: record.count_within(Duration::seconds(RETENTION_SECS), now),
            violations: record.violations,
            banned_for: record.ban_until.map(|until| to_std(until - now)),
            temp_banned_for: record.temp_ban_until.map(|until| to_std(until - now)),
        })
    }

    /// Forget everything about a user, violations included.
    ///
    /// Returns `false` if there was nothing to reset.
    pub fn reset(&self, user_id: u64) -> Result<bool, AdmissionError> {
        let removed = self.store.update(|records| records.remove(&user_id).is_some())?;
        if removed {
            info!("Rate limit record reset for user {}", user_id);
        }
        Ok(removed)
    }

    /// Lift active bans while keeping counters and violations.
    ///
    /// Returns `false` if the user had no ban.
    pub fn unban(&self, user_id: u64) -> Result<bool, AdmissionError> {
        let lifted = self.store.update(|records| match records.get_mut(&user_id) {
            Some(record) if record.ban_until.is_some() || record.temp_ban_until.is_some() => {
                record.ban_until = None;
                record.temp_ban_until = None;
                true
            }
            _ => false,
        })?;
        if lifted {
            info!("Bans lifted for user {}", user_id);
        }
        Ok(lifted)
    }

    /// Number of users with a live record.
    pub fn tracked_users(&self) -> Result<usize, AdmissionError> {
        Ok(self
            .store
            .read(|records| records.values().filter(|r| !r.is_clear()).count())?)
    }
}

/// Decide on a pruned record and apply the side effects.
fn evaluate(config: &RateLimitConfig, record: &mut RateLimitRecord, now: DateTime<Utc>) -> Admission {
    if let Some(until) = record.ban_until {
        return deny(DenyReason::Banned, until - now);
    }

    if let Some(until) = record.temp_ban_until {
        return deny(DenyReason::TempBanned, until - now);
    }

    let cooldown = Duration::seconds(config.cooldown_secs as i64);
    if config.cooldown_secs > 0
        && let Some(last) = record.last_request
        && now - last < cooldown
    {
        // Every attempt restarts the cooldown.
        record.last_request = Some(now);
        return deny(DenyReason::Cooldown, cooldown);
    }

    let windows = [
        (DenyReason::RateLimitMinute, Duration::seconds(60), config.per_minute),
        (DenyReason::RateLimitHour, Duration::hours(1), config.per_hour),
        (DenyReason::RateLimitDay, Duration::seconds(RETENTION_SECS), config.per_day),
    ];

    for (reason, window, limit) in windows {
        if limit == 0 || record.count_within(window, now) < limit as usize {
            continue;
        }

        let drain = record
            .oldest_within(window, now)
            .map(|oldest| oldest + window - now)
            .unwrap_or(window);
        let penalty = register_violation(config, record, now);

        return deny(reason, drain.max(penalty));
    }

    record.requests.push(now);
    record.last_request = Some(now);
    Admission::Allowed
}

/// Count a violation and apply the matching ban. Returns the ban length.
fn register_violation(
    config: &RateLimitConfig,
    record: &mut RateLimitRecord,
    now: DateTime<Utc>,
) -> Duration {
    record.violations = record.violations.saturating_add(1);

    if config.ban_threshold > 0 && record.violations >= config.ban_threshold {
        let ban = Duration::seconds(config.ban_duration_secs as i64);
        record.ban_until = Some(now + ban);
        return ban;
    }

    if config.temp_ban_duration_secs > 0 {
        let ban = Duration::seconds(config.temp_ban_duration_secs as i64);
        record.temp_ban_until = Some(now + ban);
        return ban;
    }

    Duration::zero()
}

fn deny(reason: DenyReason, retry_after: Duration) -> Admission {
    Admission::Denied {
        reason,
        retry_after: to_std(retry_after),
    }
}

fn to_std(d: Duration) -> StdDuration {
    d.to_std().unwrap_or_default()
}
