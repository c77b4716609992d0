//! HTTP downloader client with retry and result caching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{DownloadError, Downloader, MediaInfo, Platform};
use crate::cache::{CacheConfig, TypedCache};

/// Exponential backoff for transient downloader failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Connection errors, timeouts, 429 and 5xx are worth another attempt.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Downloader backed by a JSON HTTP API.
///
/// Requests go to `GET {api_base}/{platform}?url=<url>`.
pub struct HttpDownloader {
    http: reqwest::Client,
    api_base: Url,
    api_key: Option<String>,
    retry: RetryPolicy,
    cache: TypedCache<String, MediaInfo>,
}

impl HttpDownloader {
    pub fn new(
        api_base: Url,
        api_key: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, DownloadError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("mediarelay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(http, api_base, api_key, retry))
    }

    /// Build on an already configured HTTP client.
    pub fn with_client(
        http: reqwest::Client,
        api_base: Url,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            api_base,
            api_key,
            retry,
            cache: TypedCache::new("download_results", CacheConfig::download_results()),
        }
    }

    fn endpoint(&self, platform: Platform) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(platform.slug());
        }
        url
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, platform: Platform, url: &str) -> Result<MediaInfo, DownloadError> {
        if Platform::detect(url) != Some(platform) {
            return Err(DownloadError::UnsupportedUrl(url.to_string()));
        }

        if let Some(hit) = self.cache.get(&url.to_string()) {
            debug!("Cache hit for {}", url);
            return Ok(hit);
        }

        let endpoint = self.endpoint(platform);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let can_retry = attempt < self.retry.max_attempts;

            let mut request = self.http.get(endpoint.clone()).query(&[("url", url)]);
            if let Some(key) = &self.api_key {
                request = request.header("x-api-key", key);
            }

            let wait = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let body: Value = response
                        .json()
                        .await
                        .map_err(|e| DownloadError::Decode(e.to_string()))?;
                    let info = MediaInfo::from_json(body)?;
                    self.cache.insert(url.to_string(), info.clone());
                    debug!("Resolved {} via {} ({} items)", url, platform.slug(), info.items.len());
                    return Ok(info);
                }
                Ok(response) if can_retry && is_retryable_status(response.status()) => {
                    let hinted = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let wait = hinted
                        .unwrap_or_else(|| self.retry.delay_for(attempt))
                        .min(self.retry.max_delay);
                    warn!(
                        "Downloader returned {} for {} (attempt {}/{}), retrying in {:?}",
                        response.status(),
                        platform.slug(),
                        attempt,
                        self.retry.max_attempts,
                        wait
                    );
                    wait
                }
                Ok(response) => return Err(DownloadError::Status(response.status())),
                Err(e) if can_retry && is_retryable_error(&e) => {
                    let wait = self.retry.delay_for(attempt);
                    warn!(
                        "Downloader request for {} failed (attempt {}/{}): {}; retrying in {:?}",
                        platform.slug(),
                        attempt,
                        self.retry.max_attempts,
                        e,
                        wait
                    );
                    wait
                }
                Err(e) => return Err(e.into()),
            };

            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Json;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use serde_json::json;

    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(10), Duration::from_secs(2));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn endpoint_appends_platform_slug() {
        for base in ["https://api.example.com/v1/", "https://api.example.com/v1"] {
            let downloader = HttpDownloader::new(
                Url::parse(base).unwrap(),
                None,
                Duration::from_secs(5),
                RetryPolicy::default(),
            )
            .unwrap();
            assert_eq!(
                downloader.endpoint(Platform::TikTok).as_str(),
                "https://api.example.com/v1/tiktok"
            );
        }
    }

    /// Serves `/tiktok`: the first `failures` calls return `status`, later
    /// calls echo the url back as a video.
    async fn serve(failures: usize, status: AxumStatus) -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let app = Router::new().route(
            "/tiktok",
            get(move |Query(query): Query<HashMap<String, String>>| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < failures {
                        return (status, Json(json!({ "status": false })));
                    }
                    let body = json!({
                        "title": query.get("url"),
                        "video": "https://cdn.example/v.mp4"
                    });
                    (AxumStatus::OK, Json(body))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (Url::parse(&format!("http://{addr}/")).unwrap(), hits)
    }

    fn local_downloader(base: Url) -> HttpDownloader {
        // Keep proxy settings from the environment away from 127.0.0.1.
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        };
        HttpDownloader::with_client(http, base, None, retry)
    }

    #[tokio::test]
    async fn retries_server_errors_then_caches() {
        let (base, hits) = serve(1, AxumStatus::INTERNAL_SERVER_ERROR).await;
        let downloader = local_downloader(base);

        let url = "https://www.tiktok.com/@a/video/1";
        let info = downloader.fetch(Platform::TikTok, url).await.unwrap();
        assert_eq!(info.title.as_deref(), Some(url));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        downloader.fetch(Platform::TikTok, url).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (base, hits) = serve(usize::MAX, AxumStatus::NOT_FOUND).await;
        let downloader = local_downloader(base);

        let err = downloader
            .fetch(Platform::TikTok, "https://www.tiktok.com/@a/video/2")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Status(s) if s == StatusCode::NOT_FOUND));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (base, hits) = serve(usize::MAX, AxumStatus::SERVICE_UNAVAILABLE).await;
        let downloader = local_downloader(base);

        let err = downloader
            .fetch(Platform::TikTok, "https://www.tiktok.com/@a/video/3")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn mismatched_platform_is_rejected_without_a_request() {
        let (base, hits) = serve(0, AxumStatus::OK).await;
        let downloader = local_downloader(base);

        let err = downloader
            .fetch(Platform::YouTube, "https://www.tiktok.com/@a/video/4")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedUrl(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
