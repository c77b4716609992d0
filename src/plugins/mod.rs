//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod admin;
pub mod broadcast;
pub mod channels;
pub mod download;
pub mod history;
pub mod limits;
pub mod router;
pub mod start;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::downloader::Platform;

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start(String),

    #[command(description = "Show help")]
    Help,

    // Downloads
    #[command(description = "Download from any supported site")]
    Download(String),

    #[command(description = "Download from any supported site", hide)]
    Dl(String),

    #[command(description = "Download from TikTok")]
    Tiktok(String),

    #[command(description = "Download from YouTube")]
    Youtube(String),

    #[command(description = "Download from Facebook")]
    Facebook(String),

    #[command(description = "Download from Instagram")]
    Instagram(String),

    #[command(description = "Download from Twitter/X")]
    Twitter(String),

    #[command(description = "Download from Spotify")]
    Spotify(String),

    // History and limits
    #[command(description = "Your recent downloads")]
    History,

    #[command(description = "Clear your download history")]
    Clearhistory,

    #[command(description = "Your current usage")]
    Limits,

    #[command(description = "Cancel the current action")]
    Cancel,

    // Admin commands
    #[command(description = "Bot statistics", hide)]
    Stats,

    #[command(description = "Message every user", hide)]
    Broadcast,

    #[command(description = "Lift a rate limit ban", hide)]
    Unban(String),

    #[command(description = "Clear a user's rate limit record", hide)]
    Resetlimit(String),

    #[command(description = "Add a history channel", hide)]
    Addchannel(String),

    #[command(description = "Remove a history channel", hide)]
    Removechannel(String),

    #[command(description = "List history channels", hide)]
    Channels,
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start(payload)].endpoint(start::start_handler))
        .branch(case![Command::Help].endpoint(start::help_handler))
        // Downloads
        .branch(case![Command::Download(args)].endpoint(download::download_command))
        .branch(case![Command::Dl(args)].endpoint(download::download_command))
        .branch(case![Command::Tiktok(args)].endpoint(|bot: ThrottledBot, msg: Message, state: AppState, args: String| {
            download::platform_command(bot, msg, state, args, Platform::TikTok)
        }))
        .branch(case![Command::Youtube(args)].endpoint(|bot: ThrottledBot, msg: Message, state: AppState, args: String| {
            download::platform_command(bot, msg, state, args, Platform::YouTube)
        }))
        .branch(case![Command::Facebook(args)].endpoint(|bot: ThrottledBot, msg: Message, state: AppState, args: String| {
            download::platform_command(bot, msg, state, args, Platform::Facebook)
        }))
        .branch(case![Command::Instagram(args)].endpoint(|bot: ThrottledBot, msg: Message, state: AppState, args: String| {
            download::platform_command(bot, msg, state, args, Platform::Instagram)
        }))
        .branch(case![Command::Twitter(args)].endpoint(|bot: ThrottledBot, msg: Message, state: AppState, args: String| {
            download::platform_command(bot, msg, state, args, Platform::Twitter)
        }))
        .branch(case![Command::Spotify(args)].endpoint(|bot: ThrottledBot, msg: Message, state: AppState, args: String| {
            download::platform_command(bot, msg, state, args, Platform::Spotify)
        }))
        // History and limits
        .branch(case![Command::History].endpoint(history::history_command))
        .branch(case![Command::Clearhistory].endpoint(history::clearhistory_command))
        .branch(case![Command::Limits].endpoint(limits::limits_command))
        .branch(case![Command::Cancel].endpoint(router::cancel_command))
        // Admin
        .branch(case![Command::Stats].endpoint(admin::stats_command))
        .branch(case![Command::Broadcast].endpoint(broadcast::broadcast_command))
        .branch(case![Command::Unban(args)].endpoint(admin::unban_command))
        .branch(case![Command::Resetlimit(args)].endpoint(admin::resetlimit_command))
        .branch(case![Command::Addchannel(args)].endpoint(channels::addchannel_command))
        .branch(case![Command::Removechannel(args)].endpoint(channels::removechannel_command))
        .branch(case![Command::Channels].endpoint(channels::channels_command))
}

/// Build the free-text handler for private chats.
pub fn text_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| {
        accepts_replies(&msg)
            && msg
                .text()
                .map(|t| !t.starts_with('/'))
                .unwrap_or(false)
    })
    .endpoint(router::text_router)
}

/// Build the callback query handler.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    Update::filter_callback_query().branch(
        dptree::filter(|q: CallbackQuery| {
            q.data
                .as_deref()
                .map(|d| d.starts_with(broadcast::CALLBACK_PREFIX))
                .unwrap_or(false)
        })
        .endpoint(broadcast::broadcast_callback),
    )
}

/// Whether the free-text router will see the next message in this chat.
/// Commands that wait for a follow-up only open a session when it does.
pub(crate) fn accepts_replies(msg: &Message) -> bool {
    msg.chat.is_private()
}

/// User id of the sender, if any.
pub(crate) fn sender_id(msg: &Message) -> Option<u64> {
    msg.from.as_ref().map(|u| u.id.0)
}
