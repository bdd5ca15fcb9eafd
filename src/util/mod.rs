//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL handling**: SSRF-aware validation, relative link resolution and
//!   canonicalization of source URLs into storage keys
//! - **Text processing**: whitespace collapsing and HTML-to-text conversion
//! - **Dates**: lenient timestamp parsing into UTC
//! - **Publish paths**: the deterministic on-disk location of a source's feed
//!
//! # Examples
//!
//! ```
//! use sitefeed::util::{collapse_whitespace, validate_url, HostPolicy};
//!
//! let url = validate_url("https://example.com/news", HostPolicy::PublicOnly).unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//! assert_eq!(collapse_whitespace(" Breaking\n  news "), "Breaking news");
//! ```

mod date;
mod publish;
mod text;
mod url_validator;

pub use date::parse_datetime;
pub use publish::{publish_path, write_atomically, PUBLISH_ROOT};
pub use text::{collapse_whitespace, element_text, html_to_text, non_empty};
pub use url_validator::{
    canonicalize_url, check_url, resolve_url, validate_url, HostPolicy, UrlValidationError,
};
