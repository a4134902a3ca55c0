use crate::types::{Article, Result};
use async_trait::async_trait;
use std::collections::HashSet;

/// A place articles are pulled from, e.g. one RSS feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Fetch and normalize every entry currently listed by the source
    async fn fetch_articles(&self) -> Result<Vec<Article>>;
}

/// Persistent article storage keyed by the unique `link`.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Which of `links` are already stored. One lookup for the whole slice.
    async fn existing_links(&self, links: &[String]) -> Result<HashSet<String>>;

    /// Insert all articles atomically, skipping links that already exist.
    /// Returns the rows that were actually inserted.
    async fn insert_articles(&self, articles: &[Article]) -> Result<Vec<Article>>;
}

/// A hosted language model answering a single text prompt.
#[async_trait]
pub trait TagModel: Send + Sync {
    fn model_name(&self) -> String;

    async fn complete(&self, prompt: &str) -> Result<String>;
}
