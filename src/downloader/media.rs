//! Normalized downloader responses.
//!
//! Third-party downloader APIs disagree on field names. The raw response is
//! walked as a JSON value and folded into [`MediaInfo`], taking the first
//! populated field among the known aliases.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DownloadError;

/// Kind of a downloadable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Guess the kind from a type label or file extension.
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "video" | "mp4" | "webm" | "mov" | "hd" | "sd" => Some(Self::Video),
            "audio" | "mp3" | "m4a" | "music" | "ogg" => Some(Self::Audio),
            "image" | "photo" | "jpg" | "jpeg" | "png" | "webp" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

/// One downloadable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub url: String,
    pub quality: Option<String>,
}

/// What the downloader API returned for a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub items: Vec<MediaItem>,
}

impl MediaInfo {
    /// Kind of the item that will be sent first.
    pub fn primary_kind(&self) -> Option<MediaKind> {
        self.items.first().map(|item| item.kind)
    }

    /// All images, in order.
    pub fn images(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter().filter(|i| i.kind == MediaKind::Image)
    }

    /// Decode and normalize an API response body.
    pub fn from_json(body: Value) -> Result<Self, DownloadError> {
        let body = match body {
            Value::Object(mut map) => match map.remove("data").or_else(|| map.remove("result")) {
                Some(inner @ Value::Object(_)) => {
                    check_api_error(&Value::Object(map))?;
                    inner
                }
                Some(_) | None => Value::Object(map),
            },
            other => other,
        };

        check_api_error(&body)?;

        let Value::Object(obj) = body else {
            return Err(DownloadError::Decode("response is not an object".to_string()));
        };

        let mut items: Vec<MediaItem> = ["medias", "media", "links", "formats"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .map(|list| list.iter().filter_map(item_from_value).collect())
            .unwrap_or_default();

        let flat = [
            (MediaKind::Video, first_str(&obj, &["video", "play", "video_url"])),
            (MediaKind::Audio, first_str(&obj, &["audio", "music", "audio_url"])),
            (MediaKind::Image, first_str(&obj, &["image"])),
        ];
        for (kind, url) in flat {
            if let Some(url) = url {
                items.push(MediaItem {
                    kind,
                    url,
                    quality: None,
                });
            }
        }
        if let Some(images) = obj.get("images").and_then(Value::as_array) {
            items.extend(
                images
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .map(|url| MediaItem {
                        kind: MediaKind::Image,
                        url: url.to_string(),
                        quality: None,
                    }),
            );
        }

        if items.is_empty() {
            return Err(DownloadError::NoMedia);
        }

        Ok(Self {
            title: first_str(&obj, &["title", "desc", "caption", "name"]),
            author: first_str(&obj, &["author", "uploader", "artist", "owner"]),
            thumbnail: first_str(&obj, &["thumbnail", "cover", "thumb"]),
            items,
        })
    }
}

/// Reject bodies such as `{"status": false, "message": "..."}`.
fn check_api_error(body: &Value) -> Result<(), DownloadError> {
    let failed = match body.get("status") {
        Some(Value::Bool(ok)) => !ok,
        Some(Value::String(s)) => matches!(s.as_str(), "error" | "fail" | "failed"),
        _ => false,
    } || body.get("error").is_some_and(|e| !e.is_null() && e != &Value::Bool(false));

    if !failed {
        return Ok(());
    }

    let message = ["message", "msg", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .unwrap_or("unknown error")
        .to_string();
    Err(DownloadError::Api(message))
}

/// First non-empty string among `keys`.
fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn item_from_value(value: &Value) -> Option<MediaItem> {
    let obj = match value {
        Value::String(url) if !url.is_empty() => {
            return Some(MediaItem {
                kind: MediaKind::Video,
                url: url.clone(),
                quality: None,
            });
        }
        Value::Object(obj) => obj,
        _ => return None,
    };

    let url = first_str(obj, &["url", "link", "download_url"])?;
    let kind = first_str(obj, &["type"])
        .as_deref()
        .and_then(MediaKind::from_label)
        .or_else(|| {
            first_str(obj, &["ext", "extension", "format"])
                .as_deref()
                .and_then(MediaKind::from_label)
        })
        .unwrap_or(MediaKind::Video);

    Some(MediaItem {
        kind,
        url,
        quality: first_str(obj, &["quality", "label", "resolution"]),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalizes_media_list() {
        let info = MediaInfo::from_json(json!({
            "status": true,
            "data": {
                "title": "Cat video",
                "author": "someone",
                "medias": [
                    { "url": "https://cdn.example/v.mp4", "type": "video", "quality": "720p" },
                    { "link": "https://cdn.example/a.mp3", "ext": "mp3" },
                    { "url": "" }
                ]
            }
        }))
        .unwrap();

        assert_eq!(info.title.as_deref(), Some("Cat video"));
        assert_eq!(info.items.len(), 2);
        assert_eq!(info.items[0].quality.as_deref(), Some("720p"));
        assert_eq!(info.items[1].kind, MediaKind::Audio);
        assert_eq!(info.primary_kind(), Some(MediaKind::Video));
    }

    #[test]
    fn normalizes_flat_fields() {
        let info = MediaInfo::from_json(json!({
            "desc": "slideshow",
            "music": "https://cdn.example/m.mp3",
            "images": ["https://cdn.example/1.jpg", "https://cdn.example/2.jpg"]
        }))
        .unwrap();

        assert_eq!(info.title.as_deref(), Some("slideshow"));
        assert_eq!(info.images().count(), 2);
        assert_eq!(info.primary_kind(), Some(MediaKind::Audio));
    }

    #[test]
    fn api_error_is_surfaced() {
        let err = MediaInfo::from_json(json!({ "status": false, "message": "private video" })).unwrap_err();
        assert!(matches!(err, DownloadError::Api(ref m) if m == "private video"));
    }

    #[test]
    fn empty_response_has_no_media() {
        let err = MediaInfo::from_json(json!({ "title": "nothing" })).unwrap_err();
        assert!(matches!(err, DownloadError::NoMedia));
    }
}
