//! Supported platforms and URL detection.

use serde::{Deserialize, Serialize};
use url::Url;

/// A media platform the downloader API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    TikTok,
    YouTube,
    Facebook,
    Instagram,
    Twitter,
    Spotify,
    Pinterest,
    SoundCloud,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::TikTok,
        Platform::YouTube,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Twitter,
        Platform::Spotify,
        Platform::Pinterest,
        Platform::SoundCloud,
    ];

    /// Path segment used for the downloader API.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Twitter => "twitter",
            Self::Spotify => "spotify",
            Self::Pinterest => "pinterest",
            Self::SoundCloud => "soundcloud",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TikTok => "TikTok",
            Self::YouTube => "YouTube",
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
            Self::Twitter => "Twitter / X",
            Self::Spotify => "Spotify",
            Self::Pinterest => "Pinterest",
            Self::SoundCloud => "SoundCloud",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::TikTok => "🎵",
            Self::YouTube => "▶️",
            Self::Facebook => "📘",
            Self::Instagram => "📸",
            Self::Twitter => "🐦",
            Self::Spotify => "🎧",
            Self::Pinterest => "📌",
            Self::SoundCloud => "☁️",
        }
    }

    /// Hosts (and their subdomains) served by this platform.
    fn hosts(&self) -> &'static [&'static str] {
        match self {
            Self::TikTok => &["tiktok.com"],
            Self::YouTube => &["youtube.com", "youtu.be"],
            Self::Facebook => &["facebook.com", "fb.watch", "fb.com"],
            Self::Instagram => &["instagram.com", "instagr.am"],
            Self::Twitter => &["twitter.com", "x.com", "t.co"],
            Self::Spotify => &["spotify.com", "spotify.link"],
            Self::Pinterest => &["pinterest.com", "pin.it"],
            Self::SoundCloud => &["soundcloud.com", "snd.sc"],
        }
    }

    /// Detect the platform of a URL by its host.
    pub fn detect(url: &str) -> Option<Platform> {
        Self::resolve(url).map(|(platform, _)| platform)
    }

    /// Detect the platform and return the parsed, normalized URL.
    ///
    /// The normalized form is percent-encoded and is what gets sent to the
    /// downloader and stored in history.
    pub fn resolve(url: &str) -> Option<(Platform, Url)> {
        let url = Url::parse(url.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_lowercase();

        let platform = Self::ALL.into_iter().find(|platform| {
            platform
                .hosts()
                .iter()
                .any(|h| host == *h || host.ends_with(&format!(".{h}")))
        })?;
        Some((platform, url))
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// First http(s) URL in a piece of text.
pub fn extract_url(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find(|word| word.starts_with("http://") || word.starts_with("https://"))
        .map(|word| word.trim_end_matches(['.', ',', ')', '>']))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_platforms_by_host() {
        let cases = [
            ("https://www.tiktok.com/@user/video/123", Some(Platform::TikTok)),
            ("https://vm.tiktok.com/ZMabc/", Some(Platform::TikTok)),
            ("https://youtu.be/dQw4w9WgXcQ", Some(Platform::YouTube)),
            ("https://m.youtube.com/watch?v=x", Some(Platform::YouTube)),
            ("https://fb.watch/abc/", Some(Platform::Facebook)),
            ("https://x.com/user/status/1", Some(Platform::Twitter)),
            ("https://open.spotify.com/track/abc", Some(Platform::Spotify)),
            ("https://pin.it/xyz", Some(Platform::Pinterest)),
            ("https://example.com/video.mp4", None),
            ("https://notyoutube.com/watch", None),
            ("ftp://youtube.com/file", None),
            ("not a url", None),
        ];

        for (url, expected) in cases {
            assert_eq!(Platform::detect(url), expected, "{url}");
        }
    }

    #[test]
    fn extracts_first_url() {
        assert_eq!(
            extract_url("look at this https://youtu.be/abc, nice"),
            Some("https://youtu.be/abc")
        );
        assert_eq!(extract_url("no links here"), None);
    }

    #[test]
    fn resolve_normalizes_quotes_away() {
        let (platform, url) = Platform::resolve(r#"https://youtu.be/abc"onmouseover"#).unwrap();

        assert_eq!(platform, Platform::YouTube);
        assert!(!url.as_str().contains('"'));
        assert_eq!(url.as_str(), "https://youtu.be/abc%22onmouseover");
    }
}
