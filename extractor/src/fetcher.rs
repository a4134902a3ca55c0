use crate::types::{ExtractorError, FetchConfig, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Downloads feed documents. One attempt per call; retrying a whole run is
/// left to whoever schedules it.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<String> {
        let parsed_url = Url::parse(url)?;
        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(ExtractorError::Parse(format!(
                "unsupported feed URL scheme: {}",
                parsed_url.scheme()
            )));
        }

        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let response = self.client.get(parsed_url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ExtractorError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let max_bytes = self.config.max_feed_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > max_bytes {
                return Err(ExtractorError::FeedTooLarge {
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let content = response.text().await?;
        if content.len() > max_bytes {
            return Err(ExtractorError::FeedTooLarge {
                size_mb: content.len() / (1024 * 1024),
            });
        }

        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content)
    }
}
