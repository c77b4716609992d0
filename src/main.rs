//! mediarelay - Telegram media download relay
//!
//! Relays media links to downloader APIs and sends the results back, with
//! per-user rate limiting and multi-step conversations.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `storage` - Locked, atomically persisted JSON documents
//! - `admission` - Per-user rate limiting with progressive bans
//! - `session` - Conversation state with expiry
//! - `database` - History, user registry and history channels
//! - `downloader` - Downloader API client
//! - `cache` - LRU-based caching with Moka
//! - `bot` - Core bot functionality (with Throttle for API rate limiting)
//! - `plugins` - Command handlers
//! - `utils` - Utility functions

mod admission;
mod bot;
mod cache;
mod clock;
mod config;
mod database;
mod downloader;
mod i18n;
mod plugins;
mod session;
mod storage;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bot::AppState;
use clock::SystemClock;
use config::Config;
use downloader::{HttpDownloader, RetryPolicy};
use plugins::Command;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mediarelay=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting mediarelay...");

    let config = Arc::new(Config::from_env()?);
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);
    info!("Data directory: {}", config.data_dir.display());

    i18n::init();

    let downloader = HttpDownloader::new(
        config.downloader.api_base.clone(),
        config.downloader.api_key.clone(),
        config.downloader.timeout,
        RetryPolicy {
            max_attempts: config.downloader.max_attempts,
            ..RetryPolicy::default()
        },
    )?;
    info!("Downloader API: {}", config.downloader.api_base);

    let state = AppState::open(config.clone(), Arc::new(downloader), Arc::new(SystemClock))?;
    info!("Stores opened");

    // Initialize bot with Throttle for automatic rate limiting
    // This respects Telegram's rate limits:
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());
    info!("Bot initialized with rate limiting (Throttle)");

    let me = bot.get_me().await?;
    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register command list: {}", e);
    }

    if config.admin_ids.is_empty() {
        info!("No admin IDs configured (ADMIN_IDS is empty)");
    } else {
        info!("Bot admins: {:?}", config.admin_ids);
    }

    let dispatcher = bot::build_dispatcher(bot.clone(), state);
    bot::run(&config, bot, dispatcher).await
}
