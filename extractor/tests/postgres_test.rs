//! Runs against a real database. Set `TEST_DATABASE_URL` and use
//! `cargo test -- --ignored` to include these.

use chrono::{TimeZone, Utc};
use news_extractor::types::Article;
use news_extractor::{ArticleStore, ExistenceFilter, PgArticleStore, Persister};
use std::sync::Arc;
use uuid::Uuid;

async fn store() -> PgArticleStore {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let store = PgArticleStore::connect(&url).await.unwrap();
    store.setup_schema().await.unwrap();
    store
}

/// Links unique to one test run so tests don't see each other's rows.
fn article(run: Uuid, id: &str) -> Article {
    Article::new(
        format!("Story {}", id),
        format!("https://pg.example.com/{}/{}", run, id),
        "",
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
    )
    .with_tags(vec!["test".to_string()])
}

#[tokio::test]
#[ignore]
async fn insert_skips_conflicting_links() {
    let store = store().await;
    let run = Uuid::new_v4();

    let first = store
        .insert_articles(&[article(run, "a"), article(run, "b")])
        .await
        .unwrap();
    let second = store
        .insert_articles(&[article(run, "b"), article(run, "c")])
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert!(second[0].link.ends_with("/c"));
    assert_eq!(second[0].tags, vec!["test"]);
}

#[tokio::test]
#[ignore]
async fn existing_links_matches_stored_rows_only() {
    let store = store().await;
    let run = Uuid::new_v4();
    store.insert_articles(&[article(run, "a")]).await.unwrap();

    let stored = article(run, "a").link;
    let unknown = article(run, "z").link;
    let existing = store
        .existing_links(&[stored.clone(), unknown])
        .await
        .unwrap();

    assert_eq!(existing.len(), 1);
    assert!(existing.contains(&stored));
}

#[tokio::test]
#[ignore]
async fn filter_then_persist_is_idempotent() {
    let store = Arc::new(store().await);
    let run = Uuid::new_v4();
    let filter = ExistenceFilter::new(store.clone());
    let persister = Persister::new(store.clone());
    let batch = vec![article(run, "a"), article(run, "b")];

    let fresh = filter.filter_new(batch.clone()).await.unwrap();
    assert_eq!(persister.save(&fresh).await.unwrap(), 2);

    let fresh = filter.filter_new(batch).await.unwrap();
    assert!(fresh.is_empty());
}
