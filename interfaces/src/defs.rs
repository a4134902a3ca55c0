use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A news article as it moves through one extraction run.
///
/// Built fresh from feed data, tagged in place by the enricher, then
/// written once. There is no update path for a stored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// Unique across the store. Empty when the feed entry had no link.
    pub link: String,
    pub summary: String,
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        summary: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            summary: summary.into(),
            published,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Whether the article carries a link that can be used for dedupe.
    pub fn has_link(&self) -> bool {
        !self.link.trim().is_empty()
    }
}

/// A persisted `articles` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleRecord {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

impl ArticleRecord {
    pub fn from_article(id: i64, article: &Article) -> Self {
        Self {
            id,
            title: article.title.clone(),
            link: article.link.clone(),
            summary: Some(article.summary.clone()),
            published: Some(article.published),
            tags: Some(article.tags.clone()),
        }
    }
}

/// Why a run stopped before reaching the last stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// The feed parsed but listed no entries.
    NoEntries,
    /// The feed could not be fetched or parsed.
    FeedUnavailable(String),
    /// Every fetched article is already stored.
    NothingNew,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::NoEntries => write!(f, "feed contains no entries"),
            HaltReason::FeedUnavailable(reason) => write!(f, "feed unavailable: {}", reason),
            HaltReason::NothingNew => write!(f, "no new articles"),
        }
    }
}

/// Result of a stage that can legitimately have nothing to hand on.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Continue(T),
    Halt(HaltReason),
}

impl<I> StageOutcome<Vec<I>> {
    /// `Continue` with the items, or `Halt(reason)` when there are none.
    pub fn non_empty(items: Vec<I>, reason: HaltReason) -> Self {
        if items.is_empty() {
            StageOutcome::Halt(reason)
        } else {
            StageOutcome::Continue(items)
        }
    }
}

impl<T> StageOutcome<T> {
    pub fn is_halt(&self) -> bool {
        matches!(self, StageOutcome::Halt(_))
    }
}
