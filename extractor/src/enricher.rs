use crate::traits::TagModel;
use crate::types::{Article, ExtractorError, Result};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const MAX_TAGS: usize = 5;

/// Articles after tagging, plus how many remote calls went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentReport {
    pub articles: Vec<Article>,
    pub batches: usize,
    pub failed_batches: usize,
}

struct BatchResult {
    articles: Vec<Article>,
    failed: bool,
}

/// Attaches topical tags to articles, one model request per batch.
pub struct TagEnricher {
    model: Arc<dyn TagModel>,
    batch_size: usize,
    max_tags: usize,
    concurrency: usize,
}

impl TagEnricher {
    pub fn new(model: Arc<dyn TagModel>) -> Self {
        Self {
            model,
            batch_size: DEFAULT_BATCH_SIZE,
            max_tags: MAX_TAGS,
            concurrency: 1,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Tags requested and kept per article, capped at [`MAX_TAGS`].
    pub fn with_max_tags(mut self, max_tags: usize) -> Self {
        self.max_tags = max_tags.clamp(1, MAX_TAGS);
        self
    }

    /// Number of batch requests allowed in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    /// Tag every article. Never fails: a batch whose request or response
    /// goes wrong keeps empty tags and is counted in `failed_batches`.
    pub async fn enrich(&self, articles: Vec<Article>) -> EnrichmentReport {
        let total = articles.len();
        let batches = split_batches(articles, self.batch_size);
        let batch_count = batches.len();

        info!(
            "Tagging {} articles in {} batches with {}",
            total,
            batch_count,
            self.model.model_name()
        );

        let results: Vec<BatchResult> = stream::iter(batches.into_iter().enumerate())
            .map(|(batch_number, batch)| self.enrich_batch(batch_number * self.batch_size, batch))
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed_batches = results.iter().filter(|r| r.failed).count();
        let articles: Vec<Article> = results.into_iter().flat_map(|r| r.articles).collect();

        if failed_batches > 0 {
            warn!("{} of {} tag batches failed", failed_batches, batch_count);
        }

        EnrichmentReport {
            articles,
            batches: batch_count,
            failed_batches,
        }
    }

    async fn enrich_batch(&self, batch_start: usize, mut batch: Vec<Article>) -> BatchResult {
        let prompt = build_batch_prompt(&batch, self.max_tags);

        let outcome = match self.model.complete(&prompt).await {
            Ok(text) => parse_tag_response(&text, self.max_tags),
            Err(e) => Err(e),
        };

        let (mut tags_by_index, failed) = match outcome {
            Ok(tags_by_index) => (tags_by_index, false),
            Err(e) => {
                error!(
                    "Tag request failed for batch starting at index {}: {}",
                    batch_start, e
                );
                (HashMap::new(), true)
            }
        };

        for (position, article) in batch.iter_mut().enumerate() {
            article.tags = tags_by_index.remove(&(position + 1)).unwrap_or_default();
        }

        debug!(
            "Batch at {} tagged: {}/{} articles received tags",
            batch_start,
            batch.iter().filter(|a| !a.tags.is_empty()).count(),
            batch.len()
        );

        BatchResult {
            articles: batch,
            failed,
        }
    }
}

fn split_batches(articles: Vec<Article>, batch_size: usize) -> Vec<Vec<Article>> {
    let mut batches = Vec::with_capacity(articles.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);

    for article in articles {
        current.push(article);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// Prompt asking for `max_tags` tags per article, keyed by 1-based index.
pub fn build_batch_prompt(batch: &[Article], max_tags: usize) -> String {
    let example_tags = (1..=max_tags)
        .map(|n| format!("\"tag{}\"", n))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sections = vec![
        "You are a news tagging assistant.".to_string(),
        format!(
            "For each article below, return a JSON object with the article index and {} relevant tags.",
            max_tags
        ),
        "Respond only with JSON using this format:".to_string(),
        format!("[{{\"index\": 1, \"tags\": [{}]}}, ...]", example_tags),
        "Articles:".to_string(),
    ];

    for (position, article) in batch.iter().enumerate() {
        sections.push(format!(
            "{}. Title: \"{}\"\n   Summary: \"{}\"",
            position + 1,
            article.title.trim(),
            article.summary.trim()
        ));
    }

    sections.join("\n\n")
}

/// Read `[{"index": n, "tags": [...]}, ...]` into an index → tags map.
///
/// Entries without an integer `index` or a `tags` array are skipped; tags
/// are trimmed, non-strings and blanks dropped, and the list cut to
/// `max_tags`. Anything other than a JSON array is an error.
pub fn parse_tag_response(text: &str, max_tags: usize) -> Result<HashMap<usize, Vec<String>>> {
    let body = strip_code_fence(text);

    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        warn!("Failed to parse model response as JSON: {}\nRaw output:\n{}", e, text);
        ExtractorError::InvalidResponse(format!("not JSON: {}", e))
    })?;

    let items = parsed
        .as_array()
        .ok_or_else(|| ExtractorError::InvalidResponse("expected a JSON array".to_string()))?;

    let mut tags_by_index = HashMap::new();
    for item in items {
        let Some(object) = item.as_object() else {
            continue;
        };
        let Some(index) = object.get("index").and_then(Value::as_u64) else {
            continue;
        };
        let Some(tags) = object.get("tags").and_then(Value::as_array) else {
            continue;
        };

        let tags: Vec<String> = tags
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .take(max_tags)
            .map(str::to_string)
            .collect();

        tags_by_index.insert(index as usize, tags);
    }

    Ok(tags_by_index)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
