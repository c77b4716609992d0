//! Message builders.
//!
//! Everything returned here is Telegram HTML; user-controlled text is escaped.

use chrono::{DateTime, Utc};

use super::{format_duration_full, html_escape, truncate_chars};
use crate::admission::{RateLimitConfig, RateLimitStatus};
use crate::database::{DownloadHistoryEntry, Profile};
use crate::downloader::{MediaInfo, Platform};
use crate::i18n::get_text;

/// Telegram caption limit is 1024; leave room for markup.
const MAX_TITLE_CHARS: usize = 200;

fn title_line(title: Option<&str>) -> Option<String> {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| html_escape(&truncate_chars(t, MAX_TITLE_CHARS)))
}

/// Caption attached to media sent back to the user.
pub fn media_caption(info: &MediaInfo, platform: Platform) -> String {
    let mut out = String::new();
    if let Some(title) = title_line(info.title.as_deref()) {
        out.push_str(&format!("<b>{}</b>\n", title));
    }
    if let Some(author) = info.author.as_deref().filter(|a| !a.is_empty()) {
        out.push_str(&format!("👤 {}\n", html_escape(author)));
    }
    out.push_str(&format!("{} {}", platform.emoji(), platform.display_name()));
    out
}

/// Post for history channels after a completed download.
pub fn channel_caption(
    user: &Profile,
    platform: Platform,
    info: &MediaInfo,
    url: &str,
    at: DateTime<Utc>,
) -> String {
    let who = match &user.username {
        Some(username) => format!("@{}", html_escape(username)),
        None => html_escape(&user.first_name),
    };
    let title = title_line(info.title.as_deref()).unwrap_or_else(|| "-".to_string());
    let kind = info.primary_kind().map_or("-", |k| k.as_str());

    get_text("channel.caption")
        .replace("{user}", &who)
        .replace("{user_id}", &user.user_id.to_string())
        .replace("{platform}", &format!("{} {}", platform.emoji(), platform.display_name()))
        .replace("{title}", &title)
        .replace("{kind}", kind)
        .replace("{url}", &html_escape(url))
        .replace("{time}", &at.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Numbered list of history entries.
pub fn history_list(entries: &[DownloadHistoryEntry], total: usize) -> String {
    let mut out = get_text("history.header")
        .replace("{shown}", &entries.len().to_string())
        .replace("{total}", &total.to_string());

    for (i, entry) in entries.iter().enumerate() {
        let title = title_line(entry.title.as_deref()).unwrap_or_else(|| html_escape(&entry.url));
        out.push_str(&format!(
            "\n{}. {} <a href=\"{}\">{}</a>\n    <i>{} · {}</i>",
            i + 1,
            entry.platform.emoji(),
            html_escape(&entry.url),
            title,
            entry.media_type.as_str(),
            entry.downloaded_at.format("%Y-%m-%d %H:%M"),
        ));
    }
    out
}

fn usage(used: usize, limit: u32) -> String {
    if limit == 0 {
        format!("{} / ∞", used)
    } else {
        format!("{} / {}", used, limit)
    }
}

/// `/limits` reply.
pub fn limits_status(status: &RateLimitStatus, config: &RateLimitConfig) -> String {
    let mut out = get_text("limits.status")
        .replace("{minute}", &usage(status.minute, config.per_minute))
        .replace("{hour}", &usage(status.hour, config.per_hour))
        .replace("{day}", &usage(status.day, config.per_day))
        .replace("{violations}", &status.violations.to_string())
        .replace("{threshold}", &config.ban_threshold.to_string());

    if let Some(left) = status.banned_for {
        out.push_str("\n\n");
        out.push_str(&get_text("limits.banned_for").replace("{retry}", &format_duration_full(left.as_secs().max(1))));
    } else if let Some(left) = status.temp_banned_for {
        out.push_str("\n\n");
        out.push_str(
            &get_text("limits.temp_banned_for").replace("{retry}", &format_duration_full(left.as_secs().max(1))),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::downloader::{MediaItem, MediaKind};

    fn info(title: Option<&str>) -> MediaInfo {
        MediaInfo {
            title: title.map(String::from),
            author: Some("<dev>".to_string()),
            thumbnail: None,
            items: vec![MediaItem {
                kind: MediaKind::Video,
                url: "https://cdn.example/v.mp4".to_string(),
                quality: None,
            }],
        }
    }

    #[test]
    fn media_caption_escapes_and_names_platform() {
        let caption = media_caption(&info(Some("a < b")), Platform::TikTok);
        assert!(caption.starts_with("<b>a &lt; b</b>\n"));
        assert!(caption.contains("&lt;dev&gt;"));
        assert!(caption.ends_with("TikTok"));

        let bare = media_caption(&info(None), Platform::YouTube);
        assert!(!bare.contains("<b>"));
    }

    #[test]
    fn channel_caption_fills_placeholders() {
        let user = Profile {
            user_id: 7,
            username: None,
            first_name: "Eve & co".to_string(),
            language_code: None,
        };
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let caption = channel_caption(&user, Platform::Instagram, &info(Some("reel")), "https://instagram.com/p/x", at);

        assert!(caption.contains("Eve &amp; co"));
        assert!(caption.contains("<code>7</code>"));
        assert!(caption.contains("reel"));
        assert!(caption.contains("video"));
        assert!(caption.contains("2023-11-14 22:13 UTC"));
        assert!(!caption.contains('{'));
    }

    #[test]
    fn history_list_numbers_entries() {
        let entries = vec![DownloadHistoryEntry {
            url: "https://x.com/a/status/1".to_string(),
            platform: Platform::Twitter,
            title: None,
            media_type: MediaKind::Image,
            downloaded_at: DateTime::from_timestamp(0, 0).unwrap(),
        }];
        let text = history_list(&entries, 12);

        assert!(text.contains("1 of 12"));
        assert!(text.contains("\n1. "));
        assert!(text.contains("image · 1970-01-01 00:00"));
    }

    #[test]
    fn history_list_keeps_quoted_urls_inside_the_attribute() {
        let entries = vec![DownloadHistoryEntry {
            url: r#"https://youtu.be/abc"onmouseover"#.to_string(),
            platform: Platform::YouTube,
            title: Some("t".to_string()),
            media_type: MediaKind::Video,
            downloaded_at: DateTime::from_timestamp(0, 0).unwrap(),
        }];
        let text = history_list(&entries, 1);

        assert!(text.contains(r#"<a href="https://youtu.be/abc&quot;onmouseover">t</a>"#));
    }

    #[test]
    fn limits_status_shows_unlimited_and_ban() {
        let config = RateLimitConfig {
            per_hour: 0,
            ..RateLimitConfig::default()
        };
        let status = RateLimitStatus {
            minute: 2,
            hour: 5,
            day: 5,
            violations: 1,
            banned_for: None,
            temp_banned_for: Some(Duration::from_secs(120)),
        };
        let text = limits_status(&status, &config);

        assert!(text.contains("2 / 10"));
        assert!(text.contains("5 / ∞"));
        assert!(text.contains("2 minutes"));
    }
}
