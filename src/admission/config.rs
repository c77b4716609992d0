//! Rate limit thresholds.

use serde::{Deserialize, Serialize};

/// Thresholds for the admission controller.
///
/// A window limit of `0` disables that window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests in any trailing 60 seconds
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,

    /// Maximum requests in any trailing hour
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,

    /// Maximum requests in any trailing 24 hours
    #[serde(default = "default_per_day")]
    pub per_day: u32,

    /// Minimum spacing between two attempts, in seconds
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Violations after which the long ban applies
    #[serde(default = "default_ban_threshold")]
    pub ban_threshold: u32,

    /// Long ban duration in seconds
    #[serde(default = "default_ban_duration")]
    pub ban_duration_secs: u64,

    /// Temporary ban duration in seconds (0 = no temporary ban)
    #[serde(default = "default_temp_ban_duration")]
    pub temp_ban_duration_secs: u64,
}

fn default_per_minute() -> u32 {
    10
}

fn default_per_hour() -> u32 {
    100
}

fn default_per_day() -> u32 {
    500
}

fn default_cooldown() -> u64 {
    2
}

fn default_ban_threshold() -> u32 {
    3
}

fn default_ban_duration() -> u64 {
    3600 // 1 hour
}

fn default_temp_ban_duration() -> u64 {
    300 // 5 minutes
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
            per_day: default_per_day(),
            cooldown_secs: default_cooldown(),
            ban_threshold: default_ban_threshold(),
            ban_duration_secs: default_ban_duration(),
            temp_ban_duration_secs: default_temp_ban_duration(),
        }
    }
}
