//! /limits plugin.

use teloxide::prelude::*;

use super::sender_id;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::{ReplyExt, limits_status};

/// Handle /limits. Read-only: does not count as a request.
pub async fn limits_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let status = state.admission.status(user_id)?;
    bot.reply_html(&msg, limits_status(&status, state.admission.config()))
        .await?;
    Ok(())
}
