use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ArticleRepository, RepositoryError, RepositoryResult, UserRepository};
use crate::models::{AccessToken, ArticleRecord, User, UserChanges};

const SELECT_USER: &str = r#"
    SELECT id, email, hashed_password, is_active, is_superuser, is_verified, created_at
    FROM users
"#;

const SELECT_ARTICLE: &str = r#"
    SELECT id, title, link, summary, published, tags
    FROM articles
"#;

/// Both repositories over one PostgreSQL pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(message.to_string())
        }
        _ => RepositoryError::Database(e),
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn create_user(&self, email: &str, hashed_password: &str) -> RepositoryResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, hashed_password)
            VALUES ($1, $2, $3)
            RETURNING id, email, hashed_password, is_active, is_superuser, is_verified, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email already registered"))
    }

    async fn get_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let query = format!("{} WHERE id = $1", SELECT_USER);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let query = format!("{} WHERE email = $1", SELECT_USER);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                hashed_password = COALESCE($3, hashed_password),
                is_active = COALESCE($4, is_active),
                is_superuser = COALESCE($5, is_superuser),
                is_verified = COALESCE($6, is_verified)
            WHERE id = $1
            RETURNING id, email, hashed_password, is_active, is_superuser, is_verified, created_at
            "#,
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.hashed_password)
        .bind(changes.is_active)
        .bind(changes.is_superuser)
        .bind(changes.is_verified)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email already registered"))
    }

    async fn delete_user(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_token(&self, token: &AccessToken) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO access_tokens (token, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(&token.token)
            .bind(token.user_id)
            .bind(token.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_token(&self, token: &str) -> RepositoryResult<Option<AccessToken>> {
        Ok(sqlx::query_as::<_, AccessToken>(
            "SELECT token, user_id, created_at FROM access_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_token(&self, token: &str) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_tokens_created_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ArticleRepository for PgRepository {
    async fn list_articles(
        &self,
        limit: i64,
        offset: i64,
        tag: Option<&str>,
    ) -> RepositoryResult<Vec<ArticleRecord>> {
        let query = format!(
            "{} WHERE ($3::TEXT IS NULL OR $3 = ANY(tags)) \
             ORDER BY published DESC NULLS LAST, id DESC \
             LIMIT $1 OFFSET $2",
            SELECT_ARTICLE
        );
        Ok(sqlx::query_as::<_, ArticleRecord>(&query)
            .bind(limit)
            .bind(offset)
            .bind(tag)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_article(&self, id: i64) -> RepositoryResult<Option<ArticleRecord>> {
        let query = format!("{} WHERE id = $1", SELECT_ARTICLE);
        Ok(sqlx::query_as::<_, ArticleRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}
