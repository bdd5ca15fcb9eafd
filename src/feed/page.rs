//! Page-level metadata and HTML helpers shared by discovery and the heuristic
//! extractor.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::types::{default_description, host_label};
use crate::util::{element_text, non_empty};

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("valid meta selector"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));

/// Metadata a page advertises about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// `og:site_name` / `application-name`
    pub site_name: Option<String>,
    /// `<title>` text, falling back to `og:title`
    pub title: Option<String>,
    /// `description`, `og:description` or `twitter:description`
    pub description: Option<String>,
}

impl PageMeta {
    pub fn from_document(document: &Html) -> Self {
        let mut site_name = None;
        let mut og_title = None;
        let mut description = None;
        let mut og_description = None;

        for meta in document.select(&META_SELECTOR) {
            let element = meta.value();
            let Some(key) = element.attr("property").or_else(|| element.attr("name")) else {
                continue;
            };
            let Some(content) = element.attr("content").and_then(non_empty) else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "og:site_name" | "application-name" => {
                    site_name.get_or_insert(content);
                }
                "og:title" => {
                    og_title.get_or_insert(content);
                }
                "description" => {
                    description.get_or_insert(content);
                }
                "og:description" | "twitter:description" => {
                    og_description.get_or_insert(content);
                }
                _ => {}
            }
        }

        let title = document
            .select(&TITLE_SELECTOR)
            .next()
            .and_then(|t| non_empty(&element_text(&t)))
            .or(og_title);

        Self {
            site_name,
            title,
            description: description.or(og_description),
        }
    }

    /// Feed title from an advertised feed: parsed title, then site name, then host.
    pub fn resolve_feed_title(&self, parsed: Option<&str>, source_url: &Url) -> String {
        parsed
            .and_then(non_empty)
            .or_else(|| self.site_name.clone())
            .unwrap_or_else(|| host_label(source_url))
    }

    /// Feed title from the page alone: site name, then `<title>`, then host.
    pub fn resolve_page_title(&self, source_url: &Url) -> String {
        self.site_name
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| host_label(source_url))
    }

    /// Description: parsed value, then the page's meta description, then a
    /// generated default naming the feed.
    pub fn resolve_description(&self, parsed: Option<&str>, title: &str) -> String {
        parsed
            .and_then(non_empty)
            .or_else(|| self.description.clone())
            .unwrap_or_else(|| default_description(title))
    }
}

/// Tries `selectors` in priority order; returns the first match of the first
/// selector that matches anything under `root`.
pub(crate) fn first_match<'a>(
    root: &ElementRef<'a>,
    selectors: &[&Selector],
) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| root.select(sel).next())
}

/// Nearest ancestor element whose tag is in `names`.
pub(crate) fn nearest_ancestor<'a>(element: &ElementRef<'a>, names: &[&str]) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| names.contains(&a.value().name()))
}
