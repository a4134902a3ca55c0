use crate::enricher::TagEnricher;
use crate::filter::ExistenceFilter;
use crate::persister::Persister;
use crate::traits::{ArticleStore, FeedSource, TagModel};
use crate::types::{Article, HaltReason, Result, StageOutcome};
use backoff::backoff::{Backoff, Constant};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Filter,
    Enrich,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Filter => "filter",
            Stage::Enrich => "enrich",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        fetched: usize,
        new: usize,
        failed_batches: usize,
        inserted: usize,
    },
    /// Nothing to do; later stages were not invoked.
    Skipped { stage: Stage, reason: HaltReason },
    Failed { stage: Stage, error: String },
}

impl RunOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

/// Fetch → filter → enrich → persist, once per call to [`Pipeline::run`].
pub struct Pipeline {
    source: Arc<dyn FeedSource>,
    filter: ExistenceFilter,
    enricher: TagEnricher,
    persister: Persister,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn ArticleStore>,
        model: Arc<dyn TagModel>,
    ) -> Self {
        Self {
            source,
            filter: ExistenceFilter::new(store.clone()),
            enricher: TagEnricher::new(model),
            persister: Persister::new(store),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.enricher = self.enricher.with_batch_size(batch_size);
        self
    }

    pub fn with_max_tags(mut self, max_tags: usize) -> Self {
        self.enricher = self.enricher.with_max_tags(max_tags);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.enricher = self.enricher.with_concurrency(concurrency);
        self
    }

    pub fn with_log_truncate(mut self, log_truncate: usize) -> Self {
        self.persister = self.persister.with_log_truncate(log_truncate);
        self
    }

    /// Any fetch or parse failure halts the run instead of failing it.
    pub async fn fetch_stage(&self) -> StageOutcome<Vec<Article>> {
        match self.source.fetch_articles().await {
            Ok(articles) => StageOutcome::non_empty(articles, HaltReason::NoEntries),
            Err(e) => {
                warn!("Failed to read {}: {}", self.source.source_name(), e);
                StageOutcome::Halt(HaltReason::FeedUnavailable(e.to_string()))
            }
        }
    }

    pub async fn filter_stage(
        &self,
        articles: Vec<Article>,
    ) -> Result<StageOutcome<Vec<Article>>> {
        let fresh = self.filter.filter_new(articles).await?;
        Ok(StageOutcome::non_empty(fresh, HaltReason::NothingNew))
    }

    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Run {} started for {}", run_id, self.source.source_name());

        let outcome = self.execute().await;

        match &outcome {
            RunOutcome::Completed {
                fetched,
                new,
                failed_batches,
                inserted,
            } => info!(
                "Run {} completed: fetched={} new={} failed_batches={} inserted={}",
                run_id, fetched, new, failed_batches, inserted
            ),
            RunOutcome::Skipped { stage, reason } => {
                info!("Run {} skipped at {} stage: {}", run_id, stage, reason)
            }
            RunOutcome::Failed { stage, error } => {
                error!("Run {} failed at {} stage: {}", run_id, stage, error)
            }
        }

        RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcome,
        }
    }

    async fn execute(&self) -> RunOutcome {
        let articles = match self.fetch_stage().await {
            StageOutcome::Continue(articles) => articles,
            StageOutcome::Halt(reason) => {
                return RunOutcome::Skipped {
                    stage: Stage::Fetch,
                    reason,
                }
            }
        };
        let fetched = articles.len();

        let fresh = match self.filter_stage(articles).await {
            Ok(StageOutcome::Continue(fresh)) => fresh,
            Ok(StageOutcome::Halt(reason)) => {
                return RunOutcome::Skipped {
                    stage: Stage::Filter,
                    reason,
                }
            }
            Err(e) => {
                return RunOutcome::Failed {
                    stage: Stage::Filter,
                    error: e.to_string(),
                }
            }
        };
        let new = fresh.len();

        let report = self.enricher.enrich(fresh).await;

        match self.persister.save(&report.articles).await {
            Ok(inserted) => RunOutcome::Completed {
                fetched,
                new,
                failed_batches: report.failed_batches,
                inserted,
            },
            Err(e) => RunOutcome::Failed {
                stage: Stage::Persist,
                error: e.to_string(),
            },
        }
    }
}

/// Run once, then re-run after `delay` while the outcome is `Failed`, up to
/// `retries` extra attempts. Skipped and completed runs are final.
pub async fn run_with_retries(pipeline: &Pipeline, retries: u32, delay: Duration) -> RunReport {
    let mut backoff = Constant::new(delay);
    let mut attempt = 0;

    loop {
        let report = pipeline.run().await;
        if !report.outcome.is_failed() || attempt >= retries {
            return report;
        }

        attempt += 1;
        match backoff.next_backoff() {
            Some(wait) => {
                warn!(
                    "Run {} failed, retrying in {:?} (attempt {}/{})",
                    report.run_id, wait, attempt, retries
                );
                tokio::time::sleep(wait).await;
            }
            None => return report,
        }
    }
}
