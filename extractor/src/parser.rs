use crate::types::{Article, ExtractorError, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use tracing::{debug, info};

/// Turns RSS/Atom documents into normalized articles.
#[derive(Debug, Default, Clone)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a feed document. Entries missing a publication date get the
    /// current time.
    pub fn parse_articles(&self, content: &str) -> Result<Vec<Article>> {
        self.parse_articles_at(content, Utc::now())
    }

    /// Same as [`FeedParser::parse_articles`] with an explicit fallback
    /// timestamp for undated entries.
    pub fn parse_articles_at(&self, content: &str, fallback: DateTime<Utc>) -> Result<Vec<Article>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| ExtractorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let articles: Vec<Article> = feed
            .entries
            .into_iter()
            .map(|entry| Self::parse_entry(entry, fallback))
            .collect();

        info!("Parsed feed with {} entries", articles.len());
        Ok(articles)
    }

    fn parse_entry(entry: feed_rs::model::Entry, fallback: DateTime<Utc>) -> Article {
        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default();

        let link = Self::article_link(&entry.links);

        let summary = entry
            .summary
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        let published = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(fallback);

        Article::new(title, link, summary, published)
    }

    /// The entry's own page: the first `alternate` or rel-less link, else
    /// whatever link comes first.
    fn article_link(links: &[feed_rs::model::Link]) -> String {
        links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
            .or_else(|| links.first())
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default()
    }
}
