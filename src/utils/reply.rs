//! Reply helper utilities.
//!
//! Provides consistent reply behavior across all handlers.

use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};

use crate::bot::ThrottledBot;

/// Extension trait for answering a message in HTML.
#[allow(async_fn_in_trait)]
pub trait ReplyExt {
    /// Reply to `msg` with HTML text, quoting it.
    async fn reply_html(&self, msg: &Message, text: impl Into<String> + Send) -> anyhow::Result<Message>;

    /// Send HTML text to the chat of `msg` without quoting.
    async fn send_html(&self, msg: &Message, text: impl Into<String> + Send) -> anyhow::Result<Message>;
}

impl ReplyExt for ThrottledBot {
    async fn reply_html(&self, msg: &Message, text: impl Into<String> + Send) -> anyhow::Result<Message> {
        let sent = self
            .send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        Ok(sent)
    }

    async fn send_html(&self, msg: &Message, text: impl Into<String> + Send) -> anyhow::Result<Message> {
        let sent = self
            .send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(sent)
    }
}
