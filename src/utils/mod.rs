//! Utility functions.
//!
//! Collection of helper functions used across the bot.

pub mod format;
pub mod reply;

pub use format::{channel_caption, history_list, limits_status, media_caption};
pub use reply::ReplyExt;

/// Escape text for Telegram HTML parse mode, attribute values included.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Format a duration with its two most significant units.
pub fn format_duration_full(secs: u64) -> String {
    if secs < 60 {
        plural(secs, "second")
    } else if secs < 3600 {
        let mins = secs / 60;
        let rest = secs % 60;
        if rest > 0 {
            format!("{} {}", plural(mins, "minute"), plural(rest, "second"))
        } else {
            plural(mins, "minute")
        }
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{} {}", plural(hours, "hour"), plural(mins, "minute"))
        } else {
            plural(hours, "hour")
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{} {}", plural(days, "day"), plural(hours, "hour"))
        } else {
            plural(days, "day")
        }
    }
}

/// Cut `text` to at most `max` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Parse a Telegram id argument such as `123` or `-100123`.
pub fn parse_id(arg: &str) -> Option<i64> {
    arg.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration_full(1), "1 second");
        assert_eq!(format_duration_full(2), "2 seconds");
        assert_eq!(format_duration_full(57), "57 seconds");
        assert_eq!(format_duration_full(60), "1 minute");
        assert_eq!(format_duration_full(299), "4 minutes 59 seconds");
        assert_eq!(format_duration_full(3599), "59 minutes 59 seconds");
        assert_eq!(format_duration_full(3600), "1 hour");
        assert_eq!(format_duration_full(5400), "1 hour 30 minutes");
        assert_eq!(format_duration_full(90_000), "1 day 1 hour");
        assert_eq!(format_duration_full(172_800), "2 days");
    }

    #[test]
    fn escaping_and_truncation() {
        assert_eq!(html_escape("<b>a & b</b>"), "&lt;b&gt;a &amp; b&lt;/b&gt;");
        assert_eq!(html_escape(r#"x" onclick="y"#), "x&quot; onclick=&quot;y");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("héllo world", 5), "héll…");
    }

    #[test]
    fn ids() {
        assert_eq!(parse_id(" 42 "), Some(42));
        assert_eq!(parse_id("-1001234"), Some(-1001234));
        assert_eq!(parse_id("abc"), None);
    }
}
