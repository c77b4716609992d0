//! /start and /help plugin.

use teloxide::prelude::*;

use super::sender_id;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{ReplyExt, html_escape};

/// Handle the /start command.
pub async fn start_handler(bot: ThrottledBot, msg: Message, _state: AppState) -> anyhow::Result<()> {
    let name = msg
        .from
        .as_ref()
        .map(|u| html_escape(&u.first_name))
        .unwrap_or_default();

    bot.send_html(&msg, get_text("start.welcome").replace("{name}", &name))
        .await?;
    Ok(())
}

/// Handle the /help command. Admins also see the admin section.
pub async fn help_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let mut text = get_text("help.user");
    if sender_id(&msg).is_some_and(|id| state.is_admin(id)) {
        text.push_str(&get_text("help.admin"));
    }

    bot.reply_html(&msg, text).await?;
    Ok(())
}
