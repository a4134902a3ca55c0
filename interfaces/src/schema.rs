use sqlx::PgPool;
use tracing::info;

pub const CREATE_ARTICLES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS articles (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        link TEXT NOT NULL UNIQUE,
        summary TEXT,
        published TIMESTAMPTZ,
        tags TEXT[]
    )
"#;

pub const CREATE_ARTICLES_TAGS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS articles_tags_idx ON articles USING GIN (tags)";

pub const CREATE_ARTICLES_PUBLISHED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS articles_published_idx ON articles (published DESC NULLS LAST)";

pub const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
        is_verified BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

pub const CREATE_ACCESS_TOKENS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS access_tokens (
        token TEXT PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// Statements needed by the extraction pipeline.
pub const ARTICLE_SCHEMA: &[&str] = &[
    CREATE_ARTICLES_TABLE,
    CREATE_ARTICLES_TAGS_INDEX,
    CREATE_ARTICLES_PUBLISHED_INDEX,
];

/// Statements needed by the read API, on top of the article schema.
pub const ACCOUNT_SCHEMA: &[&str] = &[CREATE_USERS_TABLE, CREATE_ACCESS_TOKENS_TABLE];

/// Runs each statement in order. Every statement is idempotent.
pub async fn setup_schema(pool: &PgPool, statements: &[&str]) -> Result<(), sqlx::Error> {
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema is up to date ({} statements)", statements.len());
    Ok(())
}
