//! Article mining for pages that advertise no usable feed.
//!
//! Two strategies run against the parsed page:
//!
//! 1. **Structured containers**: elements that look like article cards
//!    (`<article>`, `.post`, `.entry`, blog-post microdata, ...). Each one
//!    yields at most one article: its heading link, heading text, first
//!    paragraph, date and author.
//! 2. **Link patterns**: only when the first strategy finds fewer than two
//!    articles. Every same-host anchor whose URL looks like an article
//!    permalink is kept, with details mined from its nearest container.
//!
//! Results from the first strategy always come first; both share the same
//! URL deduplication and article cap.

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::extract::ExtractError;
use super::page::{first_match, nearest_ancestor, PageMeta};
use super::types::{Article, ArticleCollector, NormalizedFeed};
use crate::util::{element_text, non_empty, parse_datetime, resolve_url};

/// Strategy B runs only when Strategy A found fewer than this many articles.
const MIN_STRUCTURED_ARTICLES: usize = 2;

/// Anchor text shorter than this (in characters) is not a plausible title.
const MIN_ANCHOR_TEXT_CHARS: usize = 4;

/// Final path segments at least this long may be article slugs.
const MIN_SLUG_LEN: usize = 10;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid heuristic selector")
}

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "article, .post, .entry, .news-item, .story, \
         [itemtype*='BlogPosting'], [itemprop='blogPost']",
    )
});
static HEADING_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("h1 a[href], h2 a[href], h3 a[href], h4 a[href]"));
static ANY_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| {
    selector("h1, h2, h3, h4, [itemprop='headline'], .title, .headline")
});
static SUMMARY: LazyLock<Selector> = LazyLock::new(|| {
    selector("p, .summary, .excerpt, .description, .teaser, [itemprop='description']")
});
static DATETIME_ATTR: LazyLock<Selector> = LazyLock::new(|| selector("[datetime]"));
static DATE_TEXT: LazyLock<Selector> = LazyLock::new(|| {
    selector("time, [itemprop='datePublished'], .date, .published, .post-date")
});
static AUTHOR: LazyLock<Selector> = LazyLock::new(|| {
    selector("[rel='author'], [itemprop='author'], .author, .byline")
});

static DATE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\d{4}/\d{1,2}(?:/\d{1,2})?(?:/|$)|/\d{4}-\d{2}-\d{2}(?:[/-]|$)")
        .expect("valid date path regex")
});
static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+(?:-[A-Za-z0-9]+)+$").expect("valid slug regex"));

/// Path segments naming a content section.
const SECTION_SEGMENTS: &[&str] = &[
    "news", "article", "articles", "post", "posts", "blog", "blogs", "story", "stories",
    "topics", "topic", "entry", "entries", "press", "updates", "insights",
];

/// Query keys whose numeric value usually identifies an article.
const ARTICLE_ID_PARAMS: &[&str] = &[
    "id", "p", "article", "articleid", "aid", "story", "storyid", "post", "postid", "newsid",
];

/// Extensions that are never article pages.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".bmp", ".avif", ".pdf", ".zip",
    ".gz", ".tgz", ".tar", ".rar", ".7z", ".bz2", ".xz", ".mp3", ".mp4", ".webm", ".css", ".js",
];

/// Container tags whose contents describe an anchor found by link patterns.
const LINK_CONTEXT_TAGS: &[&str] = &["article", "li", "div", "section"];

/// Mines articles from `html` when no feed is available.
///
/// # Errors
///
/// Returns [`ExtractError::Extraction`] when neither strategy finds an article.
pub fn extract_heuristically(
    source_url: &Url,
    html: &str,
    max_articles: usize,
) -> Result<NormalizedFeed, ExtractError> {
    let document = Html::parse_document(html);
    let mut collector = ArticleCollector::new(max_articles);

    collect_structured(&document, source_url, &mut collector);
    let structured = collector.len();

    if structured < MIN_STRUCTURED_ARTICLES {
        collect_link_patterns(&document, source_url, &mut collector);
    }

    tracing::debug!(
        source = %source_url,
        structured,
        link_patterns = collector.len() - structured,
        "Heuristic extraction finished"
    );

    if collector.is_empty() {
        return Err(ExtractError::Extraction(format!(
            "no articles found on {source_url}"
        )));
    }

    let meta = PageMeta::from_document(&document);
    let title = meta.resolve_page_title(source_url);
    let description = meta.resolve_description(None, &title);

    Ok(NormalizedFeed {
        title,
        description,
        articles: collector.into_articles(),
    })
}

// ============================================================================
// Strategy A: structured containers
// ============================================================================

fn collect_structured(document: &Html, source_url: &Url, collector: &mut ArticleCollector) {
    for container in document.select(&CONTAINER) {
        if collector.is_full() {
            break;
        }
        if let Some(article) = container_article(&container, source_url) {
            collector.push(article);
        }
    }
}

fn container_article(container: &ElementRef<'_>, source_url: &Url) -> Option<Article> {
    let link = first_match(container, &[&HEADING_LINK, &ANY_LINK])?;
    let url = link
        .value()
        .attr("href")
        .and_then(|href| resolve_url(href, source_url))?;

    let title = first_match(container, &[&HEADING])
        .and_then(|h| non_empty(&element_text(&h)))
        .or_else(|| non_empty(&element_text(&link)))?;

    Some(article_with_details(title, url, container))
}

// ============================================================================
// Strategy B: link patterns
// ============================================================================

fn collect_link_patterns(document: &Html, source_url: &Url, collector: &mut ArticleCollector) {
    for anchor in document.select(&ANY_LINK) {
        if collector.is_full() {
            break;
        }
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_url(href, source_url))
        else {
            continue;
        };
        if collector.contains(url.as_str()) || !looks_like_article(&url, source_url) {
            continue;
        }
        let Some(title) = non_empty(&element_text(&anchor))
            .or_else(|| anchor.value().attr("title").and_then(non_empty))
        else {
            continue;
        };
        if title.chars().count() < MIN_ANCHOR_TEXT_CHARS {
            continue;
        }

        let article = match nearest_ancestor(&anchor, LINK_CONTEXT_TAGS) {
            Some(context) => article_with_details(title, url, &context),
            None => Article {
                title,
                url: url.into(),
                description: None,
                published_at: None,
                author: None,
            },
        };
        collector.push(article);
    }
}

/// Whether `url` plausibly points at a single article on the source's site.
fn looks_like_article(url: &Url, source_url: &Url) -> bool {
    if url.host_str() != source_url.host_str() {
        return false;
    }

    let path = url.path();
    if path.is_empty() || path == "/" {
        return false;
    }
    let lower_path = path.to_ascii_lowercase();
    if EXCLUDED_EXTENSIONS.iter().any(|ext| lower_path.ends_with(ext)) {
        return false;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let has_section = segments
        .iter()
        .any(|s| SECTION_SEGMENTS.iter().any(|sec| s.eq_ignore_ascii_case(sec)));
    if has_section || DATE_PATH.is_match(path) || has_article_id_param(url) {
        return true;
    }

    segments.len() >= 2 && segments.last().is_some_and(|last| is_article_slug(last))
}

fn has_article_id_param(url: &Url) -> bool {
    url.query_pairs().any(|(key, value)| {
        ARTICLE_ID_PARAMS.iter().any(|p| key.eq_ignore_ascii_case(p))
            && !value.is_empty()
            && value.bytes().all(|b| b.is_ascii_digit())
    })
}

fn is_article_slug(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    let stem = [".html", ".htm", ".php"]
        .iter()
        .find_map(|ext| lower.strip_suffix(ext))
        .unwrap_or(&lower);
    stem.len() >= MIN_SLUG_LEN && SLUG.is_match(stem)
}

// ============================================================================
// Shared detail mining
// ============================================================================

fn article_with_details(title: String, url: Url, scope: &ElementRef<'_>) -> Article {
    let description = first_match(scope, &[&SUMMARY])
        .and_then(|el| non_empty(&element_text(&el)))
        .filter(|d| *d != title);

    Article {
        description,
        published_at: published_at(scope),
        author: author(scope),
        title,
        url: url.into(),
    }
}

/// First explicit `datetime` attribute, then the first date-like element's
/// `content` attribute or text.
fn published_at(scope: &ElementRef<'_>) -> Option<DateTime<Utc>> {
    if let Some(parsed) = scope
        .select(&DATETIME_ATTR)
        .filter_map(|el| el.value().attr("datetime"))
        .find_map(parse_datetime)
    {
        return Some(parsed);
    }

    scope.select(&DATE_TEXT).next().and_then(|el| {
        el.value()
            .attr("content")
            .and_then(parse_datetime)
            .or_else(|| parse_datetime(&element_text(&el)))
    })
}

fn author(scope: &ElementRef<'_>) -> Option<String> {
    let el = scope.select(&AUTHOR).next()?;
    el.value()
        .attr("content")
        .and_then(non_empty)
        .or_else(|| non_empty(&element_text(&el)))
        .map(|name| strip_byline(&name))
}

fn strip_byline(name: &str) -> String {
    let trimmed = name.trim();
    match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("by ") => trimmed[3..].trim().to_owned(),
        _ => trimmed.to_owned(),
    }
}
