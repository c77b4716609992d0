//! User registry model.
//!
//! Everyone who has talked to the bot, used for broadcasts and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teloxide::types::User;

/// Telegram profile fields the registry tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub user_id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub language_code: Option<String>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            language_code: user.language_code.clone(),
        }
    }
}

/// Stored user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Telegram user ID.
    pub user_id: u64,
    /// Username without @.
    pub username: Option<String>,
    pub first_name: String,
    #[serde(default)]
    pub language_code: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Completed downloads.
    #[serde(default)]
    pub downloads: u64,
}

impl UserRecord {
    pub fn new(profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username,
            first_name: profile.first_name,
            language_code: profile.language_code,
            first_seen: now,
            last_seen: now,
            downloads: 0,
        }
    }

    /// Check if the profile differs from what is stored.
    pub fn has_changed(&self, profile: &Profile) -> bool {
        self.username != profile.username
            || self.first_name != profile.first_name
            || self.language_code != profile.language_code
    }

    /// Display name (@username or first name).
    pub fn display_name(&self) -> String {
        self.username
            .as_ref()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| self.first_name.clone())
    }
}
