use anyhow::Context;
use interfaces::schema::{self, ACCOUNT_SCHEMA, ARTICLE_SCHEMA};
use interfaces::telemetry::init_tracing;
use news_api::auth::sweep_expired_tokens;
use news_api::{create_router, ApiSettings, AppState, PgRepository};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ApiSettings::from_env().context("Invalid API configuration")?;
    init_tracing(&settings.log_level)?;

    info!("Starting {} v{}", settings.title, settings.version);

    let pool = PgPoolOptions::new()
        .max_connections(settings.pool_size)
        .connect(settings.database_url.expose_secret())
        .await
        .context("Failed to connect to the database")?;

    schema::setup_schema(&pool, ARTICLE_SCHEMA).await?;
    schema::setup_schema(&pool, ACCOUNT_SCHEMA).await?;

    let repository = Arc::new(PgRepository::new(pool));
    let removed = sweep_expired_tokens(repository.as_ref(), settings.token_lifetime_seconds).await?;
    info!("Removed {} expired access tokens", removed);
    let address = settings.bind_address();
    let state = AppState::new(repository.clone(), repository, settings);
    let app = create_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
