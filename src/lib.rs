//! Turn any website into an RSS feed.
//!
//! Given a page URL, [`feed::Extractor`] first looks for a feed the page
//! advertises and, failing that, mines articles from the markup. Per-source
//! [`rules::SourceRules`] then filter the result before it is serialized as
//! RSS 2.0.

pub mod config;
pub mod feed;
pub mod rules;
pub mod storage;
pub mod util;
