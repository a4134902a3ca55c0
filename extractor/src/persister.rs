use crate::traits::ArticleStore;
use crate::types::{Article, Result};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_LOG_TRUNCATE: usize = 80;

/// Bulk-writes tagged articles and logs what was actually inserted.
pub struct Persister {
    store: Arc<dyn ArticleStore>,
    log_truncate: usize,
}

impl Persister {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            log_truncate: DEFAULT_LOG_TRUNCATE,
        }
    }

    pub fn with_log_truncate(mut self, log_truncate: usize) -> Self {
        self.log_truncate = log_truncate;
        self
    }

    /// Insert all articles in one atomic write. Links already stored are
    /// skipped silently. Returns the number of rows inserted.
    pub async fn save(&self, articles: &[Article]) -> Result<usize> {
        if articles.is_empty() {
            info!("No articles to save");
            return Ok(0);
        }

        let inserted = self.store.insert_articles(articles).await?;

        info!(
            "Inserted {} articles ({} skipped as duplicates)",
            inserted.len(),
            articles.len() - inserted.len()
        );
        for (i, article) in inserted.iter().enumerate() {
            info!("{}", format_record(i + 1, article, self.log_truncate));
        }

        Ok(inserted.len())
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with "...".
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Multi-line log entry for one inserted article.
pub fn format_record(position: usize, article: &Article, max_chars: usize) -> String {
    let tags = if article.tags.is_empty() {
        "—".to_string()
    } else {
        article.tags.join(", ")
    };

    format!(
        "[{}] {}\n    Title:   {}\n    Summary: {}\n    Tags:    {}\n    Link:    {}",
        position,
        article.published.format("%Y-%m-%d %H:%M:%S"),
        truncate_text(&article.title, max_chars),
        truncate_text(&article.summary, max_chars),
        tags,
        article.link
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryArticleStore;
    use chrono::{TimeZone, Utc};

    fn article(link: &str) -> Article {
        Article::new("Title", link, "Summary", Utc::now())
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_text("short", 80), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("ééééé", 2), "éé...");
        assert_eq!(truncate_text("exact", 5), "exact");
    }

    #[test]
    fn record_shows_dash_without_tags() {
        let published = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let plain = Article::new("T", "https://x", "S", published);
        let tagged = plain.clone().with_tags(vec!["a".into(), "b".into()]);

        let line = format_record(1, &plain, 80);
        assert!(line.starts_with("[1] 2025-03-04 05:06:07"));
        assert!(line.contains("Tags:    —"));
        assert!(format_record(2, &tagged, 80).contains("Tags:    a, b"));
    }

    #[tokio::test]
    async fn empty_input_does_not_touch_the_store() {
        let store = Arc::new(MemoryArticleStore::new().failing_inserts());
        let persister = Persister::new(store);

        assert_eq!(persister.save(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_save_inserts_nothing() {
        let store = Arc::new(MemoryArticleStore::new());
        let persister = Persister::new(store.clone());
        let batch = vec![article("a"), article("b")];

        assert_eq!(persister.save(&batch).await.unwrap(), 2);
        assert_eq!(persister.save(&batch).await.unwrap(), 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn insert_failure_propagates() {
        let store = Arc::new(MemoryArticleStore::new().failing_inserts());
        let persister = Persister::new(store);

        assert!(persister.save(&[article("a")]).await.is_err());
    }
}
