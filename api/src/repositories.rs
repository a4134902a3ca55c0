mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AccessToken, ArticleRecord, User, UserChanges};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique column already holds the value.
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Accounts and their access tokens. Emails are stored lowercased.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, email: &str, hashed_password: &str) -> RepositoryResult<User>;

    async fn get_user(&self, id: Uuid) -> RepositoryResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Apply `changes`; `Ok(None)` when the user does not exist.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>>;

    /// Delete the user and their tokens. Returns whether a row was removed.
    async fn delete_user(&self, id: Uuid) -> RepositoryResult<bool>;

    async fn create_token(&self, token: &AccessToken) -> RepositoryResult<()>;

    async fn get_token(&self, token: &str) -> RepositoryResult<Option<AccessToken>>;

    async fn delete_token(&self, token: &str) -> RepositoryResult<()>;

    /// Remove every token created before `cutoff`. Returns how many went.
    async fn delete_tokens_created_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;
}

/// Read-only access to stored articles.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Newest `published` first; `tag` keeps only articles carrying it.
    async fn list_articles(
        &self,
        limit: i64,
        offset: i64,
        tag: Option<&str>,
    ) -> RepositoryResult<Vec<ArticleRecord>>;

    async fn get_article(&self, id: i64) -> RepositoryResult<Option<ArticleRecord>>;
}
