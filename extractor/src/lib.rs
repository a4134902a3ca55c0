pub mod config;
pub mod enricher;
pub mod fetcher;
pub mod filter;
pub mod llm_adapter;
pub mod parser;
pub mod persister;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod traits;
pub mod types;

pub use config::Settings;
pub use enricher::{EnrichmentReport, TagEnricher};
pub use fetcher::Fetcher;
pub use filter::ExistenceFilter;
pub use llm_adapter::{LlmConfig, MockTagModel, OpenAiTagModel};
pub use parser::FeedParser;
pub use persister::Persister;
pub use pipeline::{run_with_retries, Pipeline, RunOutcome, RunReport, Stage};
pub use sources::RssFeedSource;
pub use store::{MemoryArticleStore, PgArticleStore};
pub use traits::{ArticleStore, FeedSource, TagModel};
pub use types::*;
