use anyhow::Context;
use clap::{Parser, Subcommand};
use interfaces::telemetry::init_tracing;
use news_extractor::{
    run_with_retries, ArticleStore, MemoryArticleStore, OpenAiTagModel, PgArticleStore, Pipeline,
    RssFeedSource, RunOutcome, Settings,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "news-extractor", about = "Fetch, dedupe, tag and store news articles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one pipeline run
    Run {
        /// Extra attempts for a run that fails at the filter or persist stage
        #[arg(long, default_value_t = 0)]
        retries: u32,

        #[arg(long, default_value_t = 300)]
        retry_delay_secs: u64,

        /// Keep everything in memory instead of reading and writing Postgres
        #[arg(long)]
        dry_run: bool,
    },
    /// Create the articles table and its indexes if missing
    SetupDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            retries,
            retry_delay_secs,
            dry_run,
        } => run(retries, Duration::from_secs(retry_delay_secs), dry_run).await,
        Command::SetupDb => setup_db().await,
    }
}

async fn run(retries: u32, retry_delay: Duration, dry_run: bool) -> anyhow::Result<ExitCode> {
    let settings = Settings::from_env().context("Invalid extractor configuration")?;
    init_tracing(&settings.log_level)?;

    info!("Starting news extractor for {}", settings.feed_url);

    let store: Arc<dyn ArticleStore> = if dry_run {
        info!("Dry run: using an in-memory article store");
        Arc::new(MemoryArticleStore::new())
    } else {
        Arc::new(
            PgArticleStore::connect(settings.require_database_url()?)
                .await
                .context("Failed to connect to the article database")?,
        )
    };

    let source = Arc::new(RssFeedSource::new(&settings.feed_url, settings.fetch.clone())?);
    let model = Arc::new(OpenAiTagModel::new(settings.llm.clone())?);

    let pipeline = Pipeline::new(source, store, model)
        .with_batch_size(settings.batch_size)
        .with_concurrency(settings.concurrency)
        .with_log_truncate(settings.log_truncate);

    let report = run_with_retries(&pipeline, retries, retry_delay).await;

    Ok(match report.outcome {
        RunOutcome::Failed { .. } => ExitCode::FAILURE,
        RunOutcome::Completed { .. } | RunOutcome::Skipped { .. } => ExitCode::SUCCESS,
    })
}

async fn setup_db() -> anyhow::Result<ExitCode> {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_tracing(&level)?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = PgArticleStore::connect(&database_url)
        .await
        .context("Failed to connect to the article database")?;
    store.setup_schema().await?;

    info!("Article schema is ready");
    Ok(ExitCode::SUCCESS)
}
