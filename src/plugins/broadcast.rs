//! Broadcast plugin.
//!
//! `/broadcast` -> admin sends the text -> confirm/cancel buttons -> the
//! message is sent to every registered user in the background.

use serde_json::Map;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{error, info, warn};

use super::accepts_replies;
use super::admin::require_admin;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::session::SessionState;
use crate::utils::{ReplyExt, html_escape};

/// Callback data prefix for broadcast buttons.
pub const CALLBACK_PREFIX: &str = "bc:";
const CONFIRM: &str = "bc:confirm";
const CANCEL: &str = "bc:cancel";

/// Handle /broadcast.
pub async fn broadcast_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(admin_id) = require_admin(&bot, &msg, &state).await? else {
        return Ok(());
    };
    if !accepts_replies(&msg) {
        bot.reply_html(&msg, get_text("admin.private_only")).await?;
        return Ok(());
    }

    state
        .sessions
        .set_state(admin_id, SessionState::AwaitingBroadcast, Map::new())?;
    bot.reply_html(&msg, get_text("broadcast.prompt")).await?;
    Ok(())
}

/// Text received while a broadcast is being prepared.
pub(crate) async fn receive_message(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    text: &str,
) -> anyhow::Result<()> {
    let Some(admin_id) = require_admin(bot, msg, state).await? else {
        return Ok(());
    };

    let count = state.users.count()?;
    state.sessions.set_state(
        admin_id,
        SessionState::AwaitingBroadcastConfirm {
            message: text.to_string(),
        },
        Map::new(),
    )?;

    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(get_text("broadcast.button_confirm"), CONFIRM),
        InlineKeyboardButton::callback(get_text("broadcast.button_cancel"), CANCEL),
    ]]);

    bot.send_message(
        msg.chat.id,
        get_text("broadcast.confirm")
            .replace("{count}", &count.to_string())
            .replace("{message}", &html_escape(text)),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

/// Handle the confirm/cancel buttons.
pub async fn broadcast_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let admin_id = q.from.id.0;
    if !state.is_admin(admin_id) {
        bot.answer_callback_query(&q.id)
            .text(get_text("admin.only"))
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let pending = match state.sessions.get_state(admin_id)? {
        SessionState::AwaitingBroadcastConfirm { message } => Some(message),
        _ => None,
    };

    let text = match (q.data.as_deref(), pending) {
        (Some(CANCEL), _) => {
            state.sessions.clear_state(admin_id)?;
            get_text("broadcast.cancelled")
        }
        (Some(CONFIRM), Some(message)) => {
            state.sessions.clear_state(admin_id)?;
            let targets = state.users.all_ids()?;
            let started = get_text("broadcast.started").replace("{count}", &targets.len().to_string());

            if let Some(origin) = &q.message {
                let chat_id = origin.chat().id;
                tokio::spawn(run_broadcast(bot.clone(), chat_id, admin_id, targets, message));
            }
            started
        }
        _ => get_text("broadcast.expired"),
    };

    if let Some(origin) = &q.message {
        let _ = bot
            .edit_message_text(origin.chat().id, origin.id(), text)
            .parse_mode(ParseMode::Html)
            .await;
    }
    bot.answer_callback_query(&q.id).await?;
    Ok(())
}

/// Send `message` to every target and report back to the admin chat.
async fn run_broadcast(bot: ThrottledBot, report_to: ChatId, admin_id: u64, targets: Vec<u64>, message: String) {
    info!("Broadcast by {} to {} users started", admin_id, targets.len());

    let mut sent = 0usize;
    let mut failed = 0usize;
    for user_id in targets {
        let Ok(chat) = i64::try_from(user_id) else {
            failed += 1;
            continue;
        };
        match bot.send_message(ChatId(chat), message.clone()).await {
            Ok(_) => sent += 1,
            Err(e) => {
                warn!("Broadcast to {} failed: {}", user_id, e);
                failed += 1;
            }
        }
    }

    info!("Broadcast by {} finished: {} sent, {} failed", admin_id, sent, failed);
    let report = get_text("broadcast.done")
        .replace("{sent}", &sent.to_string())
        .replace("{failed}", &failed.to_string());
    if let Err(e) = bot.send_message(report_to, report).await {
        error!("Failed to report broadcast result: {}", e);
    }
}
