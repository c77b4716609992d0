//! Admin commands: /stats, /unban, /resetlimit.
//!
//! Admins are the users listed in `ADMIN_IDS`.

use chrono::Duration;
use teloxide::prelude::*;
use tracing::info;

use super::sender_id;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{ReplyExt, parse_id};

/// Reply with a refusal unless the sender is an admin.
pub(crate) async fn require_admin(bot: &ThrottledBot, msg: &Message, state: &AppState) -> anyhow::Result<Option<u64>> {
    match sender_id(msg) {
        Some(id) if state.is_admin(id) => Ok(Some(id)),
        _ => {
            bot.reply_html(msg, get_text("admin.only")).await?;
            Ok(None)
        }
    }
}

/// Handle /stats.
pub async fn stats_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if require_admin(&bot, &msg, &state).await?.is_none() {
        return Ok(());
    }

    let day_ago = state.clock.now() - Duration::hours(24);
    let text = get_text("admin.stats")
        .replace("{users}", &state.users.count()?.to_string())
        .replace("{active}", &state.users.active_since(day_ago)?.to_string())
        .replace("{downloads}", &state.users.total_downloads()?.to_string())
        .replace("{history}", &state.history.total()?.to_string())
        .replace("{tracked}", &state.admission.tracked_users()?.to_string())
        .replace("{sessions}", &state.sessions.stored()?.to_string())
        .replace("{in_flight}", &state.in_flight.len().to_string())
        .replace("{channels}", &state.channels.all_targets()?.len().to_string());

    bot.reply_html(&msg, text).await?;
    Ok(())
}

/// Handle /unban <id>.
pub async fn unban_command(bot: ThrottledBot, msg: Message, state: AppState, args: String) -> anyhow::Result<()> {
    let Some(admin_id) = require_admin(&bot, &msg, &state).await? else {
        return Ok(());
    };
    let Some(target) = target_user(&args) else {
        bot.reply_html(&msg, get_text("admin.usage_unban")).await?;
        return Ok(());
    };

    let key = if state.admission.unban(target)? {
        info!("Admin {} lifted the ban of {}", admin_id, describe(&state, target));
        "admin.unbanned"
    } else {
        "admin.not_banned"
    };
    bot.reply_html(&msg, get_text(key).replace("{id}", &target.to_string()))
        .await?;
    Ok(())
}

/// Handle /resetlimit <id>.
pub async fn resetlimit_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let Some(admin_id) = require_admin(&bot, &msg, &state).await? else {
        return Ok(());
    };
    let Some(target) = target_user(&args) else {
        bot.reply_html(&msg, get_text("admin.usage_resetlimit")).await?;
        return Ok(());
    };

    let key = if state.admission.reset(target)? {
        info!("Admin {} reset the rate limit record of {}", admin_id, describe(&state, target));
        "admin.reset_done"
    } else {
        "admin.reset_none"
    };
    bot.reply_html(&msg, get_text(key).replace("{id}", &target.to_string()))
        .await?;
    Ok(())
}

/// Name for logs, falling back to the bare id for unknown users.
fn describe(state: &AppState, user_id: u64) -> String {
    match state.users.get(user_id) {
        Ok(Some(user)) => format!("{} ({})", user.display_name(), user_id),
        _ => user_id.to_string(),
    }
}

/// User ids are positive.
fn target_user(args: &str) -> Option<u64> {
    parse_id(args).and_then(|id| u64::try_from(id).ok()).filter(|&id| id > 0)
}
