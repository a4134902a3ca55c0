use crate::traits::ArticleStore;
use crate::types::{Article, ExtractorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::schema;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Rows per `INSERT` statement. All statements of one call share a
/// transaction; this only keeps each statement under the bind limit.
const INSERT_CHUNK_ROWS: usize = 1000;

/// `articles` table in PostgreSQL.
pub struct PgArticleStore {
    db: PgPool,
}

#[derive(sqlx::FromRow)]
struct InsertedRow {
    title: String,
    link: String,
    summary: Option<String>,
    published: Option<DateTime<Utc>>,
    tags: Option<Vec<String>>,
}

impl From<InsertedRow> for Article {
    fn from(row: InsertedRow) -> Self {
        Article {
            title: row.title,
            link: row.link,
            summary: row.summary.unwrap_or_default(),
            published: row.published.unwrap_or_else(Utc::now),
            tags: row.tags.unwrap_or_default(),
        }
    }
}

impl PgArticleStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { db })
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    pub fn get_db_pool(&self) -> &PgPool {
        &self.db
    }

    pub async fn setup_schema(&self) -> Result<()> {
        schema::setup_schema(&self.db, schema::ARTICLE_SCHEMA).await?;
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn existing_links(&self, links: &[String]) -> Result<HashSet<String>> {
        if links.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<String> =
            sqlx::query_scalar("SELECT link FROM articles WHERE link = ANY($1)")
                .bind(links)
                .fetch_all(&self.db)
                .await?;

        debug!("{} of {} links already stored", rows.len(), links.len());
        Ok(rows.into_iter().collect())
    }

    async fn insert_articles(&self, articles: &[Article]) -> Result<Vec<Article>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.db.begin().await?;
        let mut inserted = Vec::with_capacity(articles.len());

        for chunk in articles.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO articles (title, link, summary, published, tags) ");

            builder.push_values(chunk, |mut row, article| {
                row.push_bind(article.title.clone())
                    .push_bind(article.link.clone())
                    .push_bind(article.summary.clone())
                    .push_bind(article.published)
                    .push_bind(article.tags.clone());
            });
            builder.push(" ON CONFLICT (link) DO NOTHING RETURNING title, link, summary, published, tags");

            let rows = builder
                .build_query_as::<InsertedRow>()
                .fetch_all(&mut *tx)
                .await?;
            inserted.extend(rows.into_iter().map(Article::from));
        }

        tx.commit().await?;

        info!(
            "Stored {} new articles out of {} submitted",
            inserted.len(),
            articles.len()
        );
        Ok(inserted)
    }
}

/// Process-local store with the same conflict semantics as the `articles`
/// table. Backs `--dry-run` and tests.
#[derive(Default)]
pub struct MemoryArticleStore {
    articles: RwLock<Vec<Article>>,
    fail_lookups: bool,
    fail_inserts: bool,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: Vec<Article>) -> Self {
        Self {
            articles: RwLock::new(articles),
            ..Self::default()
        }
    }

    /// Make every `existing_links` call fail.
    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    /// Make every `insert_articles` call fail.
    pub fn failing_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.articles.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.articles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.articles.read().await.is_empty()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn existing_links(&self, links: &[String]) -> Result<HashSet<String>> {
        if self.fail_lookups {
            return Err(ExtractorError::Store("lookup failed".to_string()));
        }

        let wanted: HashSet<&String> = links.iter().collect();
        let stored = self.articles.read().await;
        Ok(stored
            .iter()
            .filter(|article| wanted.contains(&article.link))
            .map(|article| article.link.clone())
            .collect())
    }

    async fn insert_articles(&self, articles: &[Article]) -> Result<Vec<Article>> {
        if self.fail_inserts {
            return Err(ExtractorError::Store("insert failed".to_string()));
        }

        let mut stored = self.articles.write().await;
        let mut known: HashSet<String> = stored.iter().map(|a| a.link.clone()).collect();
        let mut inserted = Vec::new();

        for article in articles {
            if known.insert(article.link.clone()) {
                stored.push(article.clone());
                inserted.push(article.clone());
            }
        }

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(link: &str) -> Article {
        Article::new(format!("Title {}", link), link, "", Utc::now())
    }

    #[tokio::test]
    async fn memory_store_ignores_conflicting_links() {
        let store = MemoryArticleStore::with_articles(vec![article("a")]);

        let inserted = store
            .insert_articles(&[article("a"), article("b"), article("b")])
            .await
            .unwrap();

        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].link, "b");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn memory_store_reports_existing_links() {
        let store = MemoryArticleStore::with_articles(vec![article("a"), article("c")]);

        let existing = store
            .existing_links(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(existing, HashSet::from(["a".to_string()]));
    }
}
