use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use url::Url;

use super::types::{Article, ArticleCollector};
use crate::util::{html_to_text, non_empty};

/// A parsed syndication document, normalized into [`Article`]s.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub articles: Vec<Article>,
    /// Entries dropped for lacking a title or an absolute http(s) URL.
    pub skipped: usize,
}

type TextField = fn(&Entry) -> Option<String>;

/// Entry fields tried in order for the article title.
const TITLE_FIELDS: &[TextField] = &[entry_title, entry_summary, entry_content];

/// Entry fields tried in order for the description.
const DESCRIPTION_FIELDS: &[TextField] = &[entry_summary, entry_content];

/// Entry fields tried in order for the author.
const AUTHOR_FIELDS: &[TextField] = &[entry_author, entry_contributor];

fn entry_title(entry: &Entry) -> Option<String> {
    entry.title.as_ref().map(|t| html_to_text(&t.content))
}

fn entry_summary(entry: &Entry) -> Option<String> {
    entry.summary.as_ref().map(|t| html_to_text(&t.content))
}

fn entry_content(entry: &Entry) -> Option<String> {
    entry
        .content
        .as_ref()
        .and_then(|c| c.body.as_deref())
        .map(html_to_text)
}

fn entry_author(entry: &Entry) -> Option<String> {
    entry.authors.first().map(|p| p.name.clone())
}

fn entry_contributor(entry: &Entry) -> Option<String> {
    entry.contributors.first().map(|p| p.name.clone())
}

/// First field whose value is non-empty after whitespace collapsing.
fn first_text(entry: &Entry, fields: &[TextField]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| field(entry))
        .find_map(|value| non_empty(&value))
}

/// URL candidates in priority order: alternate (or untyped) links, any other
/// link that is not an enclosure or service endpoint, then the entry id.
fn url_candidates(entry: &Entry) -> impl Iterator<Item = &str> {
    let alternate = entry
        .links
        .iter()
        .filter(|l| matches!(l.rel.as_deref(), None | Some("alternate")));
    let other = entry.links.iter().filter(|l| {
        !matches!(
            l.rel.as_deref(),
            None | Some("alternate" | "enclosure" | "self" | "edit" | "replies")
        )
    });
    alternate
        .chain(other)
        .map(|l| l.href.as_str())
        .chain(std::iter::once(entry.id.as_str()))
}

/// First candidate that is an absolute http/https URL.
fn first_absolute_url(entry: &Entry) -> Option<String> {
    url_candidates(entry)
        .filter_map(|raw| Url::parse(raw.trim()).ok())
        .find(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .map(String::from)
}

/// Maps one feed entry to an article; `None` drops the entry.
fn entry_to_article(entry: &Entry) -> Option<Article> {
    let url = first_absolute_url(entry)?;
    let title = first_text(entry, TITLE_FIELDS)?;

    Some(Article {
        title,
        url,
        description: first_text(entry, DESCRIPTION_FIELDS),
        published_at: entry.published.or(entry.updated),
        author: first_text(entry, AUTHOR_FIELDS),
    })
}

/// Parses RSS/Atom/JSON Feed bytes and normalizes entries into articles.
///
/// Articles are deduplicated by URL (first occurrence wins) and capped at
/// `max_articles`. A feed that parses but yields no usable entries returns
/// `Ok` with an empty list; the caller decides what "empty" means.
///
/// # Errors
///
/// Returns the `feed-rs` error when `bytes` is not a recognizable feed.
pub fn parse_feed(bytes: &[u8], max_articles: usize) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    Ok(normalize_feed(&feed, max_articles))
}

fn normalize_feed(feed: &Feed, max_articles: usize) -> ParsedFeed {
    let mut collector = ArticleCollector::new(max_articles);
    let mut skipped = 0;

    for entry in &feed.entries {
        if collector.is_full() {
            break;
        }
        match entry_to_article(entry) {
            Some(article) => {
                collector.push(article);
            }
            None => skipped += 1,
        }
    }

    ParsedFeed {
        title: feed.title.as_ref().and_then(|t| non_empty(&html_to_text(&t.content))),
        description: feed
            .description
            .as_ref()
            .and_then(|d| non_empty(&html_to_text(&d.content))),
        articles: collector.into_articles(),
        skipped,
    }
}
