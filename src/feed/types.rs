use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::rules::SourceRules;

/// One syndicated item.
///
/// `url` is the article's identity: within one extraction result no two
/// articles share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Whitespace-collapsed, never empty.
    pub title: String,
    /// Absolute http/https URL.
    pub url: String,
    /// Plain-text summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Publish time in UTC; absent when the source date was missing or unparsable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Output of either extraction path, before rules are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeed {
    pub title: String,
    pub description: String,
    pub articles: Vec<Article>,
}

/// Which path produced the article list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    /// The page advertised a feed that parsed with at least one entry.
    FeedDiscovered,
    /// Articles were mined from the page markup.
    Heuristic,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeedDiscovered => f.write_str("feed-discovered"),
            Self::Heuristic => f.write_str("heuristic"),
        }
    }
}

/// Everything a caller gets back from one extraction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResult {
    pub source_url: String,
    pub title: String,
    pub description: String,
    /// Rule-filtered articles (what the document contains).
    pub articles: Vec<Article>,
    /// Article count before rules were applied.
    pub original_article_count: usize,
    pub skipped_top_count: usize,
    pub rule_filtered_count: usize,
    pub filtered_out_count: usize,
    pub applied_rules: SourceRules,
    /// Serialized RSS 2.0 document.
    pub xml: String,
    pub method: ExtractionMethod,
}

/// Accumulates articles while enforcing URL uniqueness and the article cap.
///
/// The first article seen for a URL wins; later duplicates are ignored.
#[derive(Debug)]
pub struct ArticleCollector {
    seen: HashSet<String>,
    articles: Vec<Article>,
    limit: usize,
}

impl ArticleCollector {
    pub fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            articles: Vec::new(),
            limit,
        }
    }

    /// Adds `article` unless its URL was already collected or the cap is hit.
    /// Returns whether it was kept.
    pub fn push(&mut self, article: Article) -> bool {
        if self.is_full() || self.seen.contains(&article.url) {
            return false;
        }
        self.seen.insert(article.url.clone());
        self.articles.push(article);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn is_full(&self) -> bool {
        self.articles.len() >= self.limit
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn into_articles(self) -> Vec<Article> {
        self.articles
    }
}

/// Host name used as the last-resort feed title.
pub(crate) fn host_label(url: &Url) -> String {
    url.host_str()
        .map(str::to_owned)
        .unwrap_or_else(|| url.to_string())
}

/// Default description when neither the feed nor the page supplies one.
pub(crate) fn default_description(title: &str) -> String {
    format!("{title}'s auto-generated feed")
}
