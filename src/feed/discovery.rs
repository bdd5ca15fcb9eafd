use scraper::{Html, Selector};
use std::future::Future;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

use super::fetcher::{FetchError, Fetcher};
use super::page::PageMeta;
use super::parser::{parse_feed, ParsedFeed};
use super::types::NormalizedFeed;
use crate::config::ExtractConfig;
use crate::util::{check_url, resolve_url, UrlValidationError};

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").expect("valid link selector"));

/// Why a single advertised feed link was abandoned.
///
/// Candidate failures are expected (feed links often point at stale or
/// mis-served endpoints); they are logged and the next candidate is tried.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// The candidate URL failed the host policy.
    #[error("candidate rejected: {0}")]
    Rejected(#[from] UrlValidationError),
    /// The candidate could not be fetched.
    #[error("candidate fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// The body was not a recognizable feed.
    #[error("candidate is not a feed: {0}")]
    Parse(String),
    /// The feed parsed but no entry survived normalization.
    #[error("candidate feed has no usable entries")]
    Empty,
}

/// Collects advertised feed links (`<link rel="alternate" type="...rss|atom|xml...">`).
///
/// Each `href` is resolved against `base_url`; only absolute http/https
/// results are kept, duplicates are dropped and the list is capped at `limit`.
pub fn find_feed_links(document: &Html, base_url: &Url, limit: usize) -> Vec<Url> {
    let mut links: Vec<Url> = Vec::new();

    for link in document.select(&LINK_SELECTOR) {
        if links.len() >= limit {
            break;
        }
        let element = link.value();
        let is_alternate = element
            .attr("rel")
            .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("alternate")));
        let is_feed_type = element.attr("type").is_some_and(is_feed_media_type);
        if !is_alternate || !is_feed_type {
            continue;
        }
        let Some(resolved) = element.attr("href").and_then(|href| resolve_url(href, base_url))
        else {
            continue;
        };
        if !links.contains(&resolved) {
            links.push(resolved);
        }
    }

    links
}

fn is_feed_media_type(media_type: &str) -> bool {
    let media_type = media_type.to_ascii_lowercase();
    media_type.contains("rss") || media_type.contains("atom") || media_type.contains("xml")
}

/// Tries `candidates` in order and returns the first success.
///
/// Each failure is logged as a recoverable event; nothing propagates past the
/// loop. Candidates are probed one at a time, never concurrently.
pub async fn first_success<T, F, Fut>(candidates: &[Url], mut attempt: F) -> Option<(Url, T)>
where
    F: FnMut(Url) -> Fut,
    Fut: Future<Output = Result<T, CandidateError>>,
{
    for candidate in candidates {
        match attempt(candidate.clone()).await {
            Ok(value) => return Some((candidate.clone(), value)),
            Err(e) => {
                tracing::debug!(candidate = %candidate, error = %e, "Feed candidate skipped");
            }
        }
    }
    None
}

async fn probe_candidate(
    fetcher: &Fetcher,
    config: &ExtractConfig,
    candidate: Url,
) -> Result<ParsedFeed, CandidateError> {
    check_url(&candidate, config.host_policy)?;
    let bytes = fetcher.fetch_bytes(&candidate).await?;
    let parsed =
        parse_feed(&bytes, config.max_articles).map_err(|e| CandidateError::Parse(e.to_string()))?;

    if parsed.skipped > 0 {
        tracing::debug!(
            feed = %candidate,
            skipped = parsed.skipped,
            "Feed entries without a title or absolute URL dropped"
        );
    }
    if parsed.articles.is_empty() {
        return Err(CandidateError::Empty);
    }
    Ok(parsed)
}

/// Looks for a feed the page advertises and normalizes its entries.
///
/// Returns `None` when the page advertises no feed, or when every advertised
/// feed fails to fetch, fails to parse, or parses with zero usable entries.
/// A feed that exists but is empty is deliberately indistinguishable from no
/// feed at all: both send the caller to the heuristic extractor.
///
/// Title falls back from the feed's own title to the page's site name to
/// the source host; description from the feed's description to the page's
/// meta description to a generated default.
pub async fn discover(
    fetcher: &Fetcher,
    source_url: &Url,
    html: &str,
    config: &ExtractConfig,
) -> Option<NormalizedFeed> {
    // `Html` is not `Send`; keep it out of scope across the awaits below.
    let (candidates, meta) = {
        let document = Html::parse_document(html);
        (
            find_feed_links(&document, source_url, config.max_feed_candidates),
            PageMeta::from_document(&document),
        )
    };

    if candidates.is_empty() {
        tracing::debug!(source = %source_url, "No advertised feed links");
        return None;
    }

    let (feed_url, parsed) =
        first_success(&candidates, |candidate| probe_candidate(fetcher, config, candidate))
            .await?;

    tracing::info!(
        source = %source_url,
        feed = %feed_url,
        articles = parsed.articles.len(),
        "Using advertised feed"
    );

    let title = meta.resolve_feed_title(parsed.title.as_deref(), source_url);
    let description = meta.resolve_description(parsed.description.as_deref(), &title);

    Some(NormalizedFeed {
        title,
        description,
        articles: parsed.articles,
    })
}
