//! /history and /clearhistory plugin.

use teloxide::prelude::*;

use super::sender_id;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{ReplyExt, history_list};

/// Entries shown by /history.
const HISTORY_PAGE: usize = 10;

/// Handle /history.
pub async fn history_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let total = state.history.count(user_id)?;
    if total == 0 {
        bot.reply_html(&msg, get_text("history.empty")).await?;
        return Ok(());
    }

    let entries = state.history.list(user_id, HISTORY_PAGE)?;
    bot.reply_html(&msg, history_list(&entries, total)).await?;
    Ok(())
}

/// Handle /clearhistory.
pub async fn clearhistory_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let text = match state.history.clear(user_id)? {
        0 => get_text("history.already_empty"),
        n => get_text("history.cleared").replace("{count}", &n.to_string()),
    };
    bot.reply_html(&msg, text).await?;
    Ok(())
}
