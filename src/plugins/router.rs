//! Free-text router and /cancel.
//!
//! Plain messages in private chats are interpreted according to the
//! sender's session state.

use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::error;

use super::{broadcast, channels, download, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::downloader::extract_url;
use crate::i18n::get_text;
use crate::session::SessionState;
use crate::utils::ReplyExt;

#[derive(Debug, PartialEq, Eq)]
enum IdleAction<'a> {
    Download(&'a str),
    Usage,
}

/// Any link goes to the download pipeline, which admits before it
/// looks at the platform.
fn idle_action(text: &str) -> IdleAction<'_> {
    match extract_url(text) {
        Some(url) => IdleAction::Download(url),
        None => IdleAction::Usage,
    }
}

/// Route a non-command text message.
pub async fn text_router(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let (Some(user_id), Some(text)) = (sender_id(&msg), msg.text()) else {
        return Ok(());
    };

    let session = match state.sessions.get_session(user_id) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to load session of user {}: {}", user_id, e);
            bot.reply_html(&msg, get_text("errors.generic")).await?;
            return Ok(());
        }
    };

    match session.state {
        SessionState::AwaitingUrl { platform } => {
            state.sessions.clear_state(user_id)?;
            if let Some(id) = session.get_i64("prompt_message_id").and_then(|id| i32::try_from(id).ok()) {
                let _ = bot.delete_message(msg.chat.id, MessageId(id)).await;
            }
            let url = extract_url(text).unwrap_or(text.trim());
            download::process_url(&bot, &msg, &state, url, platform).await
        }
        // A new message while confirming replaces the pending one.
        SessionState::AwaitingBroadcast | SessionState::AwaitingBroadcastConfirm { .. } => {
            broadcast::receive_message(&bot, &msg, &state, text).await
        }
        SessionState::AwaitingChannelId => channels::receive_channel_id(&bot, &msg, &state, text).await,
        SessionState::Idle => match idle_action(text) {
            IdleAction::Download(url) => download::process_url(&bot, &msg, &state, url, None).await,
            IdleAction::Usage => {
                bot.reply_html(&msg, get_text("download.usage")).await?;
                Ok(())
            }
        },
    }
}

/// Handle /cancel.
pub async fn cancel_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let key = if state.sessions.clear_state(user_id)? {
        "session.cancelled"
    } else {
        "session.nothing"
    };
    bot.reply_html(&msg, get_text(key)).await?;
    Ok(())
}
