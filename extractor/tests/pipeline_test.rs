use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use news_extractor::types::{Article, ExtractorError, HaltReason, Result};
use news_extractor::{
    run_with_retries, ArticleStore, FeedSource, MemoryArticleStore, MockTagModel, Pipeline,
    RunOutcome, Stage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Serves a fixed list of articles, or a fixed error.
struct StaticSource {
    articles: Vec<Article>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticSource {
    fn new(articles: Vec<Article>) -> Self {
        Self {
            articles,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    fn source_name(&self) -> String {
        "Static Source".to_string()
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExtractorError::HttpStatus {
                status: 503,
                url: "https://news.example.com/rss".to_string(),
            });
        }
        Ok(self.articles.clone())
    }
}

fn article(id: &str) -> Article {
    Article::new(
        format!("Story {}", id),
        format!("https://news.example.com/{}", id),
        format!("What happened in {}", id),
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn two_new_articles_are_tagged_and_stored() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new());
    let model = Arc::new(MockTagModel::fixed(r#"[{"index": 1, "tags": ["x"]}]"#));
    let source = Arc::new(StaticSource::new(vec![article("a"), article("b")]));

    let pipeline = Pipeline::new(source, store.clone(), model.clone());
    let report = pipeline.run().await;

    assert_eq!(
        report.outcome,
        RunOutcome::Completed {
            fetched: 2,
            new: 2,
            failed_batches: 0,
            inserted: 2,
        }
    );
    assert_eq!(model.call_count(), 1);

    let stored = store.articles().await;
    assert_eq!(stored[0].link, "https://news.example.com/a");
    assert_eq!(stored[0].tags, vec!["x"]);
    assert_eq!(stored[1].link, "https://news.example.com/b");
    assert!(stored[1].tags.is_empty());
    assert_eq!(stored[1].summary, "What happened in b");
}

#[tokio::test]
async fn rerun_only_processes_unseen_links() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::with_articles(vec![article("a")]));
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::new(vec![article("a"), article("b")]));

    let report = Pipeline::new(source, store.clone(), model.clone()).run().await;

    assert_eq!(
        report.outcome,
        RunOutcome::Completed {
            fetched: 2,
            new: 1,
            failed_batches: 0,
            inserted: 1,
        }
    );
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Story b"));
    assert!(!prompts[0].contains("Story a"));
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn everything_known_skips_enrichment() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::with_articles(vec![article("a")]));
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::new(vec![article("a")]));

    let report = Pipeline::new(source, store, model.clone()).run().await;

    assert_eq!(
        report.outcome,
        RunOutcome::Skipped {
            stage: Stage::Filter,
            reason: HaltReason::NothingNew,
        }
    );
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn empty_feed_is_skipped_at_fetch() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new().failing_lookups());
    let model = Arc::new(MockTagModel::failing());
    let source = Arc::new(StaticSource::new(Vec::new()));

    let report = Pipeline::new(source, store, model.clone()).run().await;

    assert_eq!(
        report.outcome,
        RunOutcome::Skipped {
            stage: Stage::Fetch,
            reason: HaltReason::NoEntries,
        }
    );
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn unreachable_feed_is_skipped_not_failed() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new());
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::unreachable());

    let report = Pipeline::new(source, store, model).run().await;

    match report.outcome {
        RunOutcome::Skipped {
            stage: Stage::Fetch,
            reason: HaltReason::FeedUnavailable(reason),
        } => assert!(reason.contains("503")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn lookup_failure_fails_the_run() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new().failing_lookups());
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::new(vec![article("a")]));

    let report = Pipeline::new(source, store, model.clone()).run().await;

    assert!(matches!(
        report.outcome,
        RunOutcome::Failed {
            stage: Stage::Filter,
            ..
        }
    ));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn insert_failure_fails_the_run() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new().failing_inserts());
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::new(vec![article("a")]));

    let report = Pipeline::new(source, store, model).run().await;

    assert!(matches!(
        report.outcome,
        RunOutcome::Failed {
            stage: Stage::Persist,
            ..
        }
    ));
}

#[tokio::test]
async fn one_bad_batch_does_not_affect_the_others() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new());
    let model = Arc::new(MockTagModel::new("flaky", |prompt: &str| {
        if prompt.contains("Story c") {
            Ok("I could not decide on tags.".to_string())
        } else {
            Ok(r#"[{"index": 1, "tags": ["first"]}, {"index": 2, "tags": ["second"]}]"#.to_string())
        }
    }));
    let articles: Vec<Article> = ["a", "b", "c", "d", "e"].into_iter().map(article).collect();
    let source = Arc::new(StaticSource::new(articles));

    let report = Pipeline::new(source, store.clone(), model.clone())
        .with_batch_size(2)
        .with_concurrency(3)
        .run()
        .await;

    assert_eq!(
        report.outcome,
        RunOutcome::Completed {
            fetched: 5,
            new: 5,
            failed_batches: 1,
            inserted: 5,
        }
    );
    assert_eq!(model.call_count(), 3);

    let stored = store.articles().await;
    let links: Vec<&str> = stored.iter().map(|a| a.link.as_str()).collect();
    assert_eq!(
        links,
        vec![
            "https://news.example.com/a",
            "https://news.example.com/b",
            "https://news.example.com/c",
            "https://news.example.com/d",
            "https://news.example.com/e",
        ]
    );
    assert_eq!(stored[0].tags, vec!["first"]);
    assert_eq!(stored[1].tags, vec!["second"]);
    assert!(stored[2].tags.is_empty());
    assert!(stored[3].tags.is_empty());
    assert_eq!(stored[4].tags, vec!["first"]);
}

#[tokio::test]
async fn request_count_is_ceiling_of_articles_over_batch_size() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new());
    let model = Arc::new(MockTagModel::fixed("[]"));
    let articles: Vec<Article> = (0..23).map(|i| article(&i.to_string())).collect();
    let source = Arc::new(StaticSource::new(articles));

    Pipeline::new(source, store, model.clone()).run().await;

    assert_eq!(model.call_count(), 3);
}

#[tokio::test]
async fn persisting_the_same_feed_twice_stores_each_link_once() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new());
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::new(vec![article("a"), article("b")]));
    let pipeline = Pipeline::new(source, store.clone(), model);

    pipeline.run().await;
    let second = pipeline.run().await;

    assert!(matches!(second.outcome, RunOutcome::Skipped { .. }));
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn failed_runs_are_retried_until_the_limit() {
    init_tracing();
    let store = Arc::new(MemoryArticleStore::new().failing_inserts());
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::new(vec![article("a")]));
    let pipeline = Pipeline::new(source.clone(), store, model);

    let report = run_with_retries(&pipeline, 2, Duration::from_millis(1)).await;

    assert!(report.outcome.is_failed());
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn skipped_runs_are_not_retried() {
    init_tracing();
    let store: Arc<dyn ArticleStore> = Arc::new(MemoryArticleStore::new());
    let model = Arc::new(MockTagModel::fixed("[]"));
    let source = Arc::new(StaticSource::unreachable());
    let pipeline = Pipeline::new(source.clone(), store, model);

    let report = run_with_retries(&pipeline, 5, Duration::from_millis(1)).await;

    assert!(matches!(report.outcome, RunOutcome::Skipped { .. }));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}
