//! Download plugin.
//!
//! Every download goes through the same pipeline: admission check, platform
//! detection, per-user in-flight guard, downloader API, delivery to the user,
//! then bookkeeping (history, user stats, history channels).

use futures::future::join_all;
use serde_json::{Map, json};
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, ParseMode};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{accepts_replies, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{DownloadHistoryEntry, Profile};
use crate::downloader::{MediaInfo, MediaItem, MediaKind, Platform, extract_url};
use crate::i18n::get_text;
use crate::session::SessionState;
use crate::utils::{ReplyExt, channel_caption, html_escape, media_caption};

/// Telegram accepts at most this many items per album.
const ALBUM_LIMIT: usize = 10;

/// Links listed when media cannot be uploaded.
const MAX_FALLBACK_LINKS: usize = 10;

/// Handle /download <url>. Without an argument, ask for the link.
pub async fn download_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    start_download(&bot, &msg, &state, &args, None).await
}

/// Handle /tiktok, /youtube, ... for a fixed platform.
pub async fn platform_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
    platform: Platform,
) -> anyhow::Result<()> {
    start_download(&bot, &msg, &state, &args, Some(platform)).await
}

async fn start_download(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    args: &str,
    platform: Option<Platform>,
) -> anyhow::Result<()> {
    let args = args.trim();
    if args.is_empty() {
        return prompt_for_url(bot, msg, state, platform).await;
    }

    let url = extract_url(args).unwrap_or(args);
    process_url(bot, msg, state, url, platform).await
}

/// Ask for a link and remember which platform it is for.
async fn prompt_for_url(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    platform: Option<Platform>,
) -> anyhow::Result<()> {
    let Some(user_id) = sender_id(msg) else {
        return Ok(());
    };
    if !accepts_replies(msg) {
        bot.reply_html(msg, get_text("download.private_only")).await?;
        return Ok(());
    }

    let text = match platform {
        Some(p) => get_text("download.prompt")
            .replace("{emoji}", p.emoji())
            .replace("{platform}", p.display_name()),
        None => get_text("download.prompt_any"),
    };
    let prompt = bot.reply_html(msg, text).await?;

    let mut data = Map::new();
    data.insert("prompt_message_id".to_string(), json!(prompt.id.0));
    state
        .sessions
        .set_state(user_id, SessionState::AwaitingUrl { platform }, data)?;
    Ok(())
}

/// Run the admission check. Replies and returns `false` when the request
/// may not proceed; storage failures deny.
pub(crate) async fn admit(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    user_id: u64,
) -> anyhow::Result<bool> {
    match state.admission.check(user_id) {
        Ok(admission) if admission.is_allowed() => Ok(true),
        Ok(denied) => {
            debug!("Download by user {} refused: {:?}", user_id, denied.reason());
            bot.reply_html(msg, denied.message()).await?;
            Ok(false)
        }
        Err(e) => {
            error!("Admission check failed for user {}: {}", user_id, e);
            bot.reply_html(msg, get_text("errors.generic")).await?;
            Ok(false)
        }
    }
}

/// Full download pipeline for one URL.
pub(crate) async fn process_url(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    url: &str,
    expected: Option<Platform>,
) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0;

    if !admit(bot, msg, state, user_id).await? {
        return Ok(());
    }

    let Some((platform, normalized)) = Platform::resolve(url) else {
        bot.reply_html(msg, get_text("download.unsupported")).await?;
        return Ok(());
    };
    let url = normalized.as_str();
    if let Some(expected) = expected.filter(|&p| p != platform) {
        bot.reply_html(
            msg,
            get_text("download.wrong_platform").replace("{platform}", expected.display_name()),
        )
        .await?;
        return Ok(());
    }

    let Some(_guard) = state.in_flight.try_start(user_id) else {
        bot.reply_html(msg, get_text("download.busy")).await?;
        return Ok(());
    };

    let status = bot
        .reply_html(
            msg,
            get_text("download.processing").replace("{platform}", platform.display_name()),
        )
        .await?;

    let info = match state.downloader.fetch(platform, url).await {
        Ok(info) => info,
        Err(e) => {
            warn!("Download of {} for user {} failed: {}", url, user_id, e);
            bot.edit_message_text(msg.chat.id, status.id, get_text(e.user_message_key()))
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
    };

    deliver(bot, msg, &info, platform).await?;
    let _ = bot.delete_message(msg.chat.id, status.id).await;

    record(state, user_id, url, platform, &info);
    post_to_channels(bot, state, &Profile::from(user), platform, &info, url).await;

    info!(
        "User {} downloaded {} item(s) from {}",
        user_id,
        info.items.len(),
        platform.slug()
    );
    Ok(())
}

/// Send the media, falling back to plain links if Telegram rejects it.
async fn deliver(
    bot: &ThrottledBot,
    msg: &Message,
    info: &MediaInfo,
    platform: Platform,
) -> anyhow::Result<()> {
    let caption = media_caption(info, platform);
    let images: Vec<&MediaItem> = info.images().collect();

    let sent = if images.len() > 1 {
        match send_album(bot, msg.chat.id, &images, &caption).await {
            Ok(()) => send_album_extras(bot, msg.chat.id, info).await,
            Err(e) => Err(e),
        }
    } else {
        match info.items.first() {
            Some(item) => send_item(bot, msg.chat.id, item, &caption).await,
            None => Err(anyhow::anyhow!("response has no items")),
        }
    };

    if let Err(e) = sent {
        warn!("Sending media failed, falling back to links: {}", e);
        bot.send_html(msg, link_fallback(info, &caption)).await?;
    }
    Ok(())
}

async fn send_item(
    bot: &ThrottledBot,
    chat_id: ChatId,
    item: &MediaItem,
    caption: &str,
) -> anyhow::Result<()> {
    let file = InputFile::url(Url::parse(&item.url)?);

    match item.kind {
        MediaKind::Video => {
            bot.send_video(chat_id, file)
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        MediaKind::Audio => {
            bot.send_audio(chat_id, file)
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        MediaKind::Image => {
            bot.send_photo(chat_id, file)
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }
    Ok(())
}

/// Images as albums; the caption goes on the first one.
async fn send_album(
    bot: &ThrottledBot,
    chat_id: ChatId,
    images: &[&MediaItem],
    caption: &str,
) -> anyhow::Result<()> {
    for (i, chunk) in images.chunks(ALBUM_LIMIT).enumerate() {
        let mut media = Vec::with_capacity(chunk.len());
        for (j, item) in chunk.iter().enumerate() {
            let mut photo = InputMediaPhoto::new(InputFile::url(Url::parse(&item.url)?));
            if i == 0 && j == 0 {
                photo = photo.caption(caption).parse_mode(ParseMode::Html);
            }
            media.push(InputMedia::Photo(photo));
        }
        bot.send_media_group(chat_id, media).await?;
    }
    Ok(())
}

/// Items an album cannot carry, sent one by one after it.
fn album_extras(info: &MediaInfo) -> Vec<&MediaItem> {
    info.items
        .iter()
        .filter(|item| item.kind != MediaKind::Image)
        .collect()
}

async fn send_album_extras(
    bot: &ThrottledBot,
    chat_id: ChatId,
    info: &MediaInfo,
) -> anyhow::Result<()> {
    for item in album_extras(info) {
        send_item(bot, chat_id, item, "").await?;
    }
    Ok(())
}

fn link_fallback(info: &MediaInfo, caption: &str) -> String {
    let mut text = format!("{}\n\n{}", caption, get_text("download.send_failed"));
    for item in info.items.iter().take(MAX_FALLBACK_LINKS) {
        let label = match &item.quality {
            Some(q) => format!("{} ({})", item.kind.as_str(), q),
            None => item.kind.as_str().to_string(),
        };
        text.push('\n');
        text.push_str(
            &get_text("download.link")
                .replace("{url}", &html_escape(&item.url))
                .replace("{label}", &html_escape(&label)),
        );
    }
    text
}

/// History and download counter. Failures are logged only.
fn record(state: &AppState, user_id: u64, url: &str, platform: Platform, info: &MediaInfo) {
    let entry = DownloadHistoryEntry {
        url: url.to_string(),
        platform,
        title: info.title.clone(),
        media_type: info.primary_kind().unwrap_or(MediaKind::Video),
        downloaded_at: state.clock.now(),
    };

    if let Err(e) = state.history.add(user_id, entry) {
        warn!("Failed to save history for user {}: {}", user_id, e);
    }
    if let Err(e) = state.users.record_download(user_id) {
        warn!("Failed to count download for user {}: {}", user_id, e);
    }
}

/// Post a summary to every history channel.
async fn post_to_channels(
    bot: &ThrottledBot,
    state: &AppState,
    user: &Profile,
    platform: Platform,
    info: &MediaInfo,
    url: &str,
) {
    let targets = match state.channels.all_targets() {
        Ok(targets) => targets,
        Err(e) => {
            warn!("Failed to load history channels: {}", e);
            return;
        }
    };
    if targets.is_empty() {
        return;
    }

    let caption = channel_caption(user, platform, info, url, state.clock.now());
    let sends = targets.into_iter().map(|chat_id| {
        let caption = caption.clone();
        async move {
            if let Err(e) = bot
                .send_message(ChatId(chat_id), caption)
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!("Failed to post to history channel {}: {}", chat_id, e);
            }
        }
    });
    join_all(sends).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_lists_escaped_links() {
        let info = MediaInfo {
            title: Some("clip".to_string()),
            author: None,
            thumbnail: None,
            items: vec![
                MediaItem {
                    kind: MediaKind::Video,
                    url: "https://cdn.example/v.mp4?a=1&b=2".to_string(),
                    quality: Some("720p".to_string()),
                },
                MediaItem {
                    kind: MediaKind::Audio,
                    url: "https://cdn.example/a.mp3".to_string(),
                    quality: None,
                },
            ],
        };
        let text = link_fallback(&info, "<b>clip</b>");

        assert!(text.starts_with("<b>clip</b>\n\n"));
        assert!(text.contains("<a href=\"https://cdn.example/v.mp4?a=1&amp;b=2\">video (720p)</a>"));
        assert!(text.contains(">audio</a>"));
    }

    #[test]
    fn slideshow_audio_follows_the_album() {
        let item = |kind, url: &str| MediaItem {
            kind,
            url: url.to_string(),
            quality: None,
        };
        let info = MediaInfo {
            title: None,
            author: None,
            thumbnail: None,
            items: vec![
                item(MediaKind::Image, "https://cdn.example/1.jpg"),
                item(MediaKind::Image, "https://cdn.example/2.jpg"),
                item(MediaKind::Audio, "https://cdn.example/track.mp3"),
            ],
        };

        assert_eq!(info.images().count(), 2);
        let extras = album_extras(&info);
        assert_eq!(extras.len(), 1);
        assert_eq!(extras[0].kind, MediaKind::Audio);
        assert_eq!(extras[0].url, "https://cdn.example/track.mp3");
    }
}
