//! History channel management: /addchannel, /removechannel, /channels.

use serde_json::Map;
use teloxide::prelude::*;
use tracing::warn;

use super::accepts_replies;
use super::admin::require_admin;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::session::SessionState;
use crate::utils::{ReplyExt, html_escape, parse_id};

/// Handle /addchannel [id]. Without an id, ask for one.
pub async fn addchannel_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let Some(admin_id) = require_admin(&bot, &msg, &state).await? else {
        return Ok(());
    };

    if args.trim().is_empty() {
        if !accepts_replies(&msg) {
            bot.reply_html(&msg, get_text("channels.usage_add")).await?;
            return Ok(());
        }
        state
            .sessions
            .set_state(admin_id, SessionState::AwaitingChannelId, Map::new())?;
        bot.reply_html(&msg, get_text("channels.prompt")).await?;
        return Ok(());
    }

    add_channel(&bot, &msg, &state, admin_id, &args).await
}

/// Channel id received after /addchannel.
pub(crate) async fn receive_channel_id(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    text: &str,
) -> anyhow::Result<()> {
    let Some(admin_id) = require_admin(bot, msg, state).await? else {
        return Ok(());
    };

    state.sessions.clear_state(admin_id)?;
    add_channel(bot, msg, state, admin_id, text).await
}

async fn add_channel(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    admin_id: u64,
    raw: &str,
) -> anyhow::Result<()> {
    let Some(chat_id) = parse_id(raw) else {
        bot.reply_html(msg, get_text("channels.invalid")).await?;
        return Ok(());
    };

    // The bot must be able to post there.
    let chat = match bot.get_chat(ChatId(chat_id)).await {
        Ok(chat) => chat,
        Err(e) => {
            warn!("History channel {} is not reachable: {}", chat_id, e);
            bot.reply_html(msg, get_text("channels.unreachable")).await?;
            return Ok(());
        }
    };

    let title = chat.title().map(str::to_string);
    let key = if state.channels.add(chat_id, title, admin_id)? {
        "channels.added"
    } else {
        "channels.exists"
    };
    bot.reply_html(msg, get_text(key).replace("{id}", &chat_id.to_string()))
        .await?;
    Ok(())
}

/// Handle /removechannel <id>.
pub async fn removechannel_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if require_admin(&bot, &msg, &state).await?.is_none() {
        return Ok(());
    }

    let Some(chat_id) = parse_id(&args) else {
        bot.reply_html(&msg, get_text("channels.usage_remove")).await?;
        return Ok(());
    };

    let text = if state.channels.is_configured(chat_id) {
        get_text("channels.configured")
    } else if state.channels.remove(chat_id)? {
        get_text("channels.removed").replace("{id}", &chat_id.to_string())
    } else {
        get_text("channels.not_found")
    };
    bot.reply_html(&msg, text).await?;
    Ok(())
}

/// Handle /channels.
pub async fn channels_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if require_admin(&bot, &msg, &state).await?.is_none() {
        return Ok(());
    }

    let channels = state.channels.list()?;
    if channels.is_empty() {
        bot.reply_html(&msg, get_text("channels.empty")).await?;
        return Ok(());
    }

    let mut text = get_text("channels.header");
    for channel in &channels {
        let source = if channel.added_by.is_some() {
            get_text("channels.source_runtime")
        } else {
            get_text("channels.source_config")
        };
        text.push_str(
            &get_text("channels.item")
                .replace("{id}", &channel.chat_id.to_string())
                .replace("{title}", &html_escape(channel.title.as_deref().unwrap_or("")))
                .replace("{source}", &source),
        );
    }
    bot.reply_html(&msg, text).await?;
    Ok(())
}
