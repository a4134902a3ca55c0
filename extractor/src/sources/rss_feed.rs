use crate::traits::FeedSource;
use crate::types::{Article, FetchConfig, Result};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use tracing::info;

/// A single RSS/Atom feed reached over HTTP(S).
pub struct RssFeedSource {
    pub url: String,
    fetcher: Fetcher,
    parser: FeedParser,
}

impl RssFeedSource {
    pub fn new(url: impl Into<String>, fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            fetcher: Fetcher::new(fetch_config)?,
            parser: FeedParser::new(),
        })
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    fn source_name(&self) -> String {
        if let Ok(parsed) = url::Url::parse(&self.url) {
            if let Some(domain) = parsed.domain() {
                return format!("RSS Feed ({})", domain);
            }
        }
        "RSS Feed".to_string()
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        info!("Pulling RSS feed: {}", self.url);

        let content = self.fetcher.fetch_feed(&self.url).await?;
        let articles = self.parser.parse_articles(&content)?;

        info!("Fetched {} articles from {}", articles.len(), self.source_name());
        Ok(articles)
    }
}
