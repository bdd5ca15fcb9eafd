//! Website-to-feed extraction.
//!
//! - [`discovery`] - Find and parse the RSS/Atom feeds a page advertises
//! - [`heuristic`] - Mine articles from page markup when no feed works
//! - [`synth`] - Serialize articles as an RSS 2.0 document
//! - [`extract`] - The end-to-end pipeline ([`Extractor::extract_feed`])
//! - [`batch`] - Many sources at once, failures isolated per source
//!
//! # Example
//!
//! ```ignore
//! use sitefeed::config::ExtractConfig;
//! use sitefeed::feed::{ExtractOptions, Extractor};
//!
//! let extractor = Extractor::new(ExtractConfig::default())?;
//! let result = extractor
//!     .extract_feed("https://example.com/blog", ExtractOptions::default())
//!     .await?;
//! println!("{} articles via {}", result.articles.len(), result.method);
//! ```

pub mod batch;
pub mod discovery;
pub mod extract;
mod fetcher;
pub mod heuristic;
mod page;
mod parser;
pub mod synth;
mod types;

pub use batch::{extract_all, BatchReport, SourceOutcome};
pub use discovery::{discover, find_feed_links, CandidateError};
pub use extract::{build_result, ExtractError, ExtractOptions, Extractor};
pub use fetcher::{FetchError, Fetcher};
pub use heuristic::extract_heuristically;
pub use page::PageMeta;
pub use parser::{parse_feed, ParsedFeed};
pub use synth::{synthesize, Channel, SynthError};
pub use types::{Article, ArticleCollector, ExtractionMethod, FeedResult, NormalizedFeed};
