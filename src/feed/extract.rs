use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use super::discovery::discover;
use super::fetcher::{FetchError, Fetcher};
use super::heuristic::extract_heuristically;
use super::synth::{synthesize, Channel, SynthError};
use super::types::{ExtractionMethod, FeedResult, NormalizedFeed};
use crate::config::ExtractConfig;
use crate::rules::{apply_rules, NoRules, RuleStore, SourceRules};
use crate::util::{validate_url, UrlValidationError};

/// Errors surfaced by a single extraction.
///
/// Every variant is fatal for the source being extracted and nothing else;
/// batch callers record it and move on.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source is not a well-formed http/https URL, or its host is
    /// rejected by the configured policy. No request was made.
    #[error("Invalid source URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// The page could not be retrieved or is not HTML.
    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] FetchError),
    /// Neither an advertised feed nor the page markup produced an article.
    #[error("No articles extracted: {0}")]
    Extraction(String),
    /// The feed document could not be serialized.
    #[error("Failed to build feed document: {0}")]
    Synthesis(#[from] SynthError),
}

/// Per-call options for [`Extractor::extract_feed`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Rules to apply instead of whatever the rule store holds.
    pub rules: Option<SourceRules>,
}

/// Turns a website URL into an RSS document.
///
/// One `Extractor` owns one HTTP client; it holds no mutable state, so a
/// single instance can drive any number of concurrent extractions.
#[derive(Debug, Clone)]
pub struct Extractor {
    fetcher: Fetcher,
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Result<Self, ExtractError> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { fetcher, config })
    }

    /// Extracts a feed for `url` using only the rules in `options`.
    pub async fn extract_feed(
        &self,
        url: &str,
        options: ExtractOptions,
    ) -> Result<FeedResult, ExtractError> {
        self.extract_feed_with_store(url, options, &NoRules).await
    }

    /// Extracts a feed for `url`.
    ///
    /// Sequence: validate the URL, fetch the page, try the feeds it
    /// advertises, fall back to mining the markup, apply rules, synthesize
    /// the document from the filtered articles.
    ///
    /// Rules come from `options` when given, otherwise from `store`. A store
    /// that fails to answer is logged and treated as having no rules.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::InvalidUrl`] - Malformed or non-http(s) URL
    /// - [`ExtractError::Fetch`] - Page unreachable, non-2xx, or not HTML
    /// - [`ExtractError::Extraction`] - Both strategies found zero articles
    pub async fn extract_feed_with_store<S: RuleStore>(
        &self,
        url: &str,
        options: ExtractOptions,
        store: &S,
    ) -> Result<FeedResult, ExtractError> {
        let source_url = validate_url(url, self.config.host_policy)?;
        let html = self.fetcher.fetch_html(&source_url).await?;

        let (feed, method) = match discover(&self.fetcher, &source_url, &html, &self.config).await
        {
            Some(feed) => (feed, ExtractionMethod::FeedDiscovered),
            None => {
                tracing::info!(
                    source = %source_url,
                    "No usable advertised feed, extracting from page markup"
                );
                let feed = extract_heuristically(&source_url, &html, self.config.max_articles)?;
                (feed, ExtractionMethod::Heuristic)
            }
        };

        let rules = match options.rules {
            Some(rules) => rules,
            None => match store.load_rules(source_url.as_str()).await {
                Ok(stored) => stored.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(
                        source = %source_url,
                        error = %e,
                        "Failed to load source rules, continuing without them"
                    );
                    SourceRules::default()
                }
            },
        };

        let result = build_result(
            &source_url,
            feed,
            method,
            &rules,
            &self.config.language,
            Utc::now(),
        )?;

        tracing::info!(
            source = %source_url,
            method = %result.method,
            original = result.original_article_count,
            kept = result.articles.len(),
            "Extracted feed"
        );
        Ok(result)
    }
}

/// Applies `rules` to `feed` and synthesizes the document.
///
/// The document carries the filtered articles under the feed's unfiltered
/// title and description.
pub fn build_result(
    source_url: &Url,
    feed: NormalizedFeed,
    method: ExtractionMethod,
    rules: &SourceRules,
    language: &str,
    now: DateTime<Utc>,
) -> Result<FeedResult, ExtractError> {
    let original_article_count = feed.articles.len();
    let outcome = apply_rules(feed.articles, rules);

    let channel = Channel {
        source_url,
        title: &feed.title,
        description: &feed.description,
        language,
    };
    let xml = synthesize(&channel, &outcome.articles, now)?;

    Ok(FeedResult {
        source_url: source_url.to_string(),
        title: feed.title,
        description: feed.description,
        articles: outcome.articles,
        original_article_count,
        skipped_top_count: outcome.skipped_top_count,
        rule_filtered_count: outcome.rule_filtered_count,
        filtered_out_count: outcome.filtered_out_count,
        applied_rules: outcome.applied_rules,
        xml,
        method,
    })
}
