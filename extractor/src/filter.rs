use crate::traits::ArticleStore;
use crate::types::{Article, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Drops articles whose link is already in the store.
pub struct ExistenceFilter {
    store: Arc<dyn ArticleStore>,
}

impl ExistenceFilter {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Keep only articles not yet stored, in their original order.
    ///
    /// Articles without a usable link are passed through untouched, and a
    /// batch with no links at all skips the lookup. Store errors propagate.
    pub async fn filter_new(&self, articles: Vec<Article>) -> Result<Vec<Article>> {
        if articles.is_empty() {
            return Ok(articles);
        }

        let mut seen = HashSet::new();
        let links: Vec<String> = articles
            .iter()
            .filter(|a| a.has_link())
            .map(|a| a.link.clone())
            .filter(|link| seen.insert(link.clone()))
            .collect();

        if links.is_empty() {
            warn!(
                "None of the {} articles carry a link, skipping existence check",
                articles.len()
            );
            return Ok(articles);
        }

        let existing = self.store.existing_links(&links).await?;
        info!("Found {} existing links", existing.len());

        let total = articles.len();
        let fresh: Vec<Article> = articles
            .into_iter()
            .filter(|a| !a.has_link() || !existing.contains(&a.link))
            .collect();

        info!("Filtered {} new articles out of {}", fresh.len(), total);
        Ok(fresh)
    }
}
