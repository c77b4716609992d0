//! Request admission control.
//!
//! Decides, per user, whether a download request may proceed. Counts are kept
//! over sliding minute/hour/day windows in a shared JSON store; repeated
//! window violations escalate from a short temporary ban to a long ban.
//!
//! ## State machine
//!
//! ```text
//! clear --violation--> temp_banned --violations >= threshold--> banned
//!   ^                                                              |
//!   +--------------------------- ban expires ----------------------+
//! ```
//!
//! Transitions are driven by comparing stored deadlines against "now".

mod config;
mod controller;
mod record;

use std::time::Duration;

use thiserror::Error;

use crate::i18n::get_text;
use crate::storage::StorageError;
use crate::utils::format_duration_full;

pub use config::RateLimitConfig;
pub use controller::{AdmissionController, RateLimitStatus};
pub use record::RateLimitRecord;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Banned,
    TempBanned,
    Cooldown,
    RateLimitMinute,
    RateLimitHour,
    RateLimitDay,
}

impl DenyReason {
    /// Stable identifier, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banned => "banned",
            Self::TempBanned => "temp_banned",
            Self::Cooldown => "cooldown",
            Self::RateLimitMinute => "rate_limit_minute",
            Self::RateLimitHour => "rate_limit_hour",
            Self::RateLimitDay => "rate_limit_day",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied {
        reason: DenyReason,
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Reason for a denial, `None` when allowed.
    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allowed => None,
            Self::Denied { reason, .. } => Some(*reason),
        }
    }

    /// User-facing text for a denial. Empty when allowed.
    pub fn message(&self) -> String {
        let Self::Denied {
            reason,
            retry_after,
        } = self
        else {
            return String::new();
        };

        // Round up so "0 seconds" is never shown for a sub-second wait.
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        get_text(&format!("limits.denied.{}", reason.as_str()))
            .replace("{retry}", &format_duration_full(secs.max(1)))
    }
}

/// Infrastructure failure of an admission check.
///
/// Callers must treat this as a denial.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("rate limit store unavailable: {0}")]
    Storage(#[from] StorageError),
}
