use futures::stream::{self, StreamExt};

use super::extract::{ExtractError, ExtractOptions, Extractor};
use super::types::FeedResult;
use crate::rules::RuleStore;

/// Result of one source within a batch.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source_url: String,
    pub result: Result<FeedResult, ExtractError>,
}

/// Per-source outcomes of [`extract_all`], in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &FeedResult)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (o.source_url.as_str(), r)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &ExtractError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.source_url.as_str(), e)))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// True when there was at least one source and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.success_count() == 0
    }
}

/// Extracts every source, at most `concurrency` at a time.
///
/// Sources are independent: a failure is recorded in its [`SourceOutcome`]
/// and never stops the others. There are no retries.
pub async fn extract_all<S: RuleStore>(
    extractor: &Extractor,
    sources: &[String],
    store: &S,
    concurrency: usize,
) -> BatchReport {
    let mut indexed: Vec<(usize, SourceOutcome)> = stream::iter(sources.iter().enumerate())
        .map(|(index, source_url)| async move {
            let result = extractor
                .extract_feed_with_store(source_url, ExtractOptions::default(), store)
                .await;
            if let Err(e) = &result {
                tracing::warn!(source = %source_url, error = %e, "Source extraction failed");
            }
            (
                index,
                SourceOutcome {
                    source_url: source_url.clone(),
                    result,
                },
            )
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    indexed.sort_by_key(|(index, _)| *index);
    let report = BatchReport {
        outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
    };

    tracing::info!(
        sources = sources.len(),
        succeeded = report.success_count(),
        failed = report.failure_count(),
        "Batch extraction finished"
    );
    report
}
