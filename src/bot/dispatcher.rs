//! Message dispatcher setup.
//!
//! Builds the dispatcher with all command, text and callback handlers.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::warn;

use crate::admission::AdmissionController;
use crate::clock::Clock;
use crate::config::Config;
use crate::database::{ChannelRepository, HistoryRepository, Profile, UserRepository};
use crate::downloader::{Downloader, InFlight};
use crate::plugins;
use crate::session::SessionManager;
use crate::storage::StorageError;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Per-user request admission.
    pub admission: Arc<AdmissionController>,

    /// Conversational state.
    pub sessions: Arc<SessionManager>,

    pub history: Arc<HistoryRepository>,
    pub users: Arc<UserRepository>,
    pub channels: Arc<ChannelRepository>,

    /// Downloader API client.
    pub downloader: Arc<dyn Downloader>,

    /// Users with a download in progress.
    pub in_flight: InFlight,

    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Open every store under the configured data directory.
    pub fn open(
        config: Arc<Config>,
        downloader: Arc<dyn Downloader>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let timeout = config.lock_timeout;

        let admission = AdmissionController::open(
            config.store_path("rate_limits.json"),
            config.rate_limit.clone(),
            timeout,
            clock.clone(),
        )?;
        let sessions = SessionManager::open(
            config.store_path("sessions.json"),
            config.session_ttl,
            timeout,
            clock.clone(),
        )?;
        let history = HistoryRepository::open(config.store_path("history.json"), timeout)?;
        let users = UserRepository::open(config.store_path("users.json"), timeout, clock.clone())?;
        let channels = ChannelRepository::open(
            config.store_path("channels.json"),
            config.history_channels.clone(),
            timeout,
            clock.clone(),
        )?;

        Ok(Self {
            config,
            admission: Arc::new(admission),
            sessions: Arc::new(sessions),
            history: Arc::new(history),
            users: Arc::new(users),
            channels: Arc::new(channels),
            downloader,
            in_flight: InFlight::new(),
            clock,
        })
    }

    /// Check if a user may run admin commands.
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.config.is_admin(user_id)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .error_handler(LoggingErrorHandler::with_custom_text("Error while handling update"))
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Message handlers: user tracking first, then commands, then free text
    let message_handler = Update::filter_message()
        .inspect_async(track_user)
        .branch(plugins::command_handler())
        .branch(plugins::text_handler());

    dptree::entry()
        .branch(message_handler)
        .branch(plugins::callback_handler())
}

/// Track user from message (runs before all handlers).
async fn track_user(msg: Message, state: AppState) {
    let Some(user) = msg.from.as_ref() else {
        return;
    };
    if user.is_bot {
        return;
    }
    if let Err(e) = state.users.touch(Profile::from(user)) {
        warn!("Failed to track user {}: {}", user.id, e);
    }
}
