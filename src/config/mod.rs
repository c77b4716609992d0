//! Configuration module for mediarelay.
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::admission::RateLimitConfig;

/// Bot running mode
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Invalid or missing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("WEBHOOK_URL must be set when BOT_MODE is webhook")]
    WebhookUrlMissing,
}

/// Webhook settings, present only in webhook mode.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: Url,
    pub port: u16,
    pub secret: Option<String>,
}

/// Downloader API settings.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub api_base: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Requests per download, the first one included.
    pub max_attempts: u32,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook: Option<WebhookConfig>,

    /// Bot username (without @). Fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Users allowed to run admin commands.
    pub admin_ids: Vec<u64>,

    /// Channels that always receive download copies.
    pub history_channels: Vec<i64>,

    /// Directory holding the JSON stores.
    pub data_dir: PathBuf,

    pub downloader: DownloaderConfig,
    pub rate_limit: RateLimitConfig,

    pub session_ttl: Duration,
    pub lock_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &'static str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_mode = match var("BOT_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("polling") => BotMode::Polling,
            Some("webhook") => BotMode::Webhook,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "BOT_MODE",
                    value: other.to_string(),
                });
            }
        };

        let webhook = match bot_mode {
            BotMode::Polling => None,
            BotMode::Webhook => {
                let raw = var("WEBHOOK_URL").ok_or(ConfigError::WebhookUrlMissing)?;
                let url = Url::parse(&raw).map_err(|_| ConfigError::Invalid {
                    key: "WEBHOOK_URL",
                    value: raw,
                })?;
                Some(WebhookConfig {
                    url,
                    port: parse_or(var("WEBHOOK_PORT"), "WEBHOOK_PORT", 8443)?,
                    secret: var("WEBHOOK_SECRET"),
                })
            }
        };

        let raw_base = var("DOWNLOADER_API_BASE").ok_or(ConfigError::Missing("DOWNLOADER_API_BASE"))?;
        let api_base = Url::parse(&raw_base).map_err(|_| ConfigError::Invalid {
            key: "DOWNLOADER_API_BASE",
            value: raw_base,
        })?;

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            per_minute: parse_or(var("RATE_LIMIT_PER_MINUTE"), "RATE_LIMIT_PER_MINUTE", defaults.per_minute)?,
            per_hour: parse_or(var("RATE_LIMIT_PER_HOUR"), "RATE_LIMIT_PER_HOUR", defaults.per_hour)?,
            per_day: parse_or(var("RATE_LIMIT_PER_DAY"), "RATE_LIMIT_PER_DAY", defaults.per_day)?,
            cooldown_secs: parse_or(var("RATE_LIMIT_COOLDOWN_SECS"), "RATE_LIMIT_COOLDOWN_SECS", defaults.cooldown_secs)?,
            ban_threshold: parse_or(var("RATE_LIMIT_BAN_THRESHOLD"), "RATE_LIMIT_BAN_THRESHOLD", defaults.ban_threshold)?,
            ban_duration_secs: parse_or(var("RATE_LIMIT_BAN_SECS"), "RATE_LIMIT_BAN_SECS", defaults.ban_duration_secs)?,
            temp_ban_duration_secs: parse_or(
                var("RATE_LIMIT_TEMP_BAN_SECS"),
                "RATE_LIMIT_TEMP_BAN_SECS",
                defaults.temp_ban_duration_secs,
            )?,
        };

        let max_attempts: u32 = parse_or(var("HTTP_MAX_ATTEMPTS"), "HTTP_MAX_ATTEMPTS", 3)?;

        Ok(Self {
            bot_token: var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?,
            bot_mode,
            webhook,
            bot_username: var("BOT_USERNAME")
                .map(|s| s.trim_start_matches('@').to_string())
                .filter(|s| !s.is_empty()),
            admin_ids: parse_list(var("ADMIN_IDS"), "ADMIN_IDS")?,
            history_channels: parse_list(var("HISTORY_CHANNELS"), "HISTORY_CHANNELS")?,
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
            downloader: DownloaderConfig {
                api_base,
                api_key: var("DOWNLOADER_API_KEY"),
                timeout: Duration::from_secs(parse_or(var("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 30)?),
                max_attempts: max_attempts.max(1),
            },
            rate_limit,
            session_ttl: Duration::from_secs(parse_or(var("SESSION_TTL_SECS"), "SESSION_TTL_SECS", 3600)?),
            lock_timeout: Duration::from_millis(parse_or(
                var("STORE_LOCK_TIMEOUT_MS"),
                "STORE_LOCK_TIMEOUT_MS",
                5000,
            )?),
        })
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn store_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Comma-separated list; empty items are skipped, bad items are errors.
fn parse_list<T: FromStr>(raw: Option<String>, key: &'static str) -> Result<Vec<T>, ConfigError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::Invalid {
                key,
                value: s.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("BOT_TOKEN", "123:abc"),
        ("DOWNLOADER_API_BASE", "https://api.example.com/dl"),
    ];

    #[test]
    fn defaults() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.bot_mode, BotMode::Polling);
        assert!(config.webhook.is_none());
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.downloader.timeout, Duration::from_secs(30));
        assert_eq!(config.downloader.max_attempts, 3);
        assert_eq!(config.rate_limit.per_minute, 10);
        assert_eq!(config.rate_limit.per_hour, 100);
        assert_eq!(config.rate_limit.per_day, 500);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.lock_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn lists_and_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("ADMIN_IDS", "1, 2,,3"),
            ("HISTORY_CHANNELS", "-1001,-1002"),
            ("BOT_USERNAME", "@relay_bot"),
            ("RATE_LIMIT_PER_MINUTE", "3"),
            ("RATE_LIMIT_COOLDOWN_SECS", "0"),
            ("HTTP_MAX_ATTEMPTS", "5"),
        ]);
        let config = load(&pairs).unwrap();

        assert_eq!(config.admin_ids, vec![1, 2, 3]);
        assert!(config.is_admin(2));
        assert_eq!(config.history_channels, vec![-1001, -1002]);
        assert_eq!(config.bot_username.as_deref(), Some("relay_bot"));
        assert_eq!(config.rate_limit.per_minute, 3);
        assert_eq!(config.rate_limit.cooldown_secs, 0);
        assert_eq!(config.downloader.max_attempts, 5);
    }

    #[test]
    fn attempts_never_drop_below_one() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("HTTP_MAX_ATTEMPTS", "0"));
        assert_eq!(load(&pairs).unwrap().downloader.max_attempts, 1);

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("HTTP_MAX_RETRIES", "9"));
        assert_eq!(load(&pairs).unwrap().downloader.max_attempts, 3);
    }

    #[test]
    fn missing_and_invalid_values_are_errors() {
        assert!(matches!(
            load(&[("BOT_TOKEN", "x")]),
            Err(ConfigError::Missing("DOWNLOADER_API_BASE"))
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LIMIT_PER_DAY", "lots"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::Invalid { key: "RATE_LIMIT_PER_DAY", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BOT_MODE", "webhook"));
        assert!(matches!(load(&pairs), Err(ConfigError::WebhookUrlMissing)));
    }

    #[test]
    fn webhook_mode() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("BOT_MODE", "Webhook"),
            ("WEBHOOK_URL", "https://bot.example.com/hook"),
            ("WEBHOOK_PORT", "9000"),
        ]);
        let config = load(&pairs).unwrap();
        let webhook = config.webhook.unwrap();

        assert_eq!(webhook.port, 9000);
        assert_eq!(webhook.url.path(), "/hook");
        assert!(webhook.secret.is_none());
    }
}
