//! Downloader API integration.
//!
//! The bot does not download anything itself: it hands the URL to a
//! third-party downloader API and relays the returned media links.

mod client;
mod inflight;
mod media;
mod platform;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{HttpDownloader, RetryPolicy};
pub use inflight::{InFlight, InFlightGuard};
pub use media::{MediaInfo, MediaItem, MediaKind};
pub use platform::{Platform, extract_url};

/// Errors from resolving a URL through the downloader API.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("unsupported url: {0}")]
    UnsupportedUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("downloader api returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("downloader api error: {0}")]
    Api(String),

    #[error("malformed downloader response: {0}")]
    Decode(String),

    #[error("no downloadable media in response")]
    NoMedia,
}

impl DownloadError {
    /// Message key shown to the user for this error.
    pub fn user_message_key(&self) -> &'static str {
        match self {
            Self::UnsupportedUrl(_) => "download.unsupported",
            Self::Api(_) | Self::NoMedia => "download.not_found",
            Self::Http(_) | Self::Status(_) | Self::Decode(_) => "download.api_failed",
        }
    }
}

/// Resolves a media URL into downloadable items.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, platform: Platform, url: &str) -> Result<MediaInfo, DownloadError>;
}
