//! Configuration file parser for ~/.config/sitefeed/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::util::HostPolicy;

/// Maximum number of articles in one extraction result.
pub const DEFAULT_MAX_ARTICLES: usize = 50;
/// Timeout for the page fetch and for each feed-candidate fetch.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
/// Redirect hops followed before a fetch fails.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
/// Advertised feed links probed per page.
pub const DEFAULT_MAX_FEED_CANDIDATES: usize = 10;
/// Response bodies above this size are rejected (10MB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
/// Browser-like user agent; many sites serve stripped pages to unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum articles per extracted feed.
    pub max_articles: usize,

    /// Fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Redirect hops followed per request.
    pub max_redirects: usize,

    /// Advertised feed links probed per page.
    pub max_feed_candidates: usize,

    /// Response size cap in bytes.
    pub max_response_bytes: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Accept localhost and private-network sources (intranets, local testing).
    pub allow_private_hosts: bool,

    /// Value of the synthesized document's `<language>` element.
    pub language: String,

    /// Directory the `batch` command writes documents under.
    pub output_dir: PathBuf,

    /// Sources extracted concurrently by the `batch` command.
    pub concurrency: usize,

    /// Source URLs processed by the `batch` command.
    pub sources: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_articles: DEFAULT_MAX_ARTICLES,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_feed_candidates: DEFAULT_MAX_FEED_CANDIDATES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_hosts: false,
            language: "en".to_string(),
            output_dir: PathBuf::from("."),
            concurrency: 4,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "max_articles",
        "fetch_timeout_secs",
        "max_redirects",
        "max_feed_candidates",
        "max_response_bytes",
        "user_agent",
        "allow_private_hosts",
        "language",
        "output_dir",
        "concurrency",
        "sources",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Limits and client settings handed to the extraction pipeline.
    pub fn extract_config(&self) -> ExtractConfig {
        ExtractConfig {
            max_articles: self.max_articles.max(1),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            max_redirects: self.max_redirects,
            max_feed_candidates: self.max_feed_candidates,
            max_response_bytes: self.max_response_bytes,
            user_agent: self.user_agent.clone(),
            host_policy: if self.allow_private_hosts {
                HostPolicy::AllowPrivate
            } else {
                HostPolicy::PublicOnly
            },
            language: self.language.clone(),
        }
    }
}

/// Per-extractor settings. Passed by value into each component so tests can
/// override any limit for a single call.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub max_articles: usize,
    pub fetch_timeout: Duration,
    pub max_redirects: usize,
    pub max_feed_candidates: usize,
    pub max_response_bytes: usize,
    pub user_agent: String,
    pub host_policy: HostPolicy,
    pub language: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Config::default().extract_config()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("sitefeed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_articles, 50);
        assert_eq!(config.fetch_timeout_secs, 15);
        assert_eq!(config.max_feed_candidates, 10);
        assert!(!config.allow_private_hosts);
        assert!(config.sources.is_empty());
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.output_dir, PathBuf::from("."));
        let published = config.output_dir.join(crate::util::publish_path("https://example.com/"));
        assert!(published.starts_with("./feeds/example.com"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/sitefeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.max_articles, DEFAULT_MAX_ARTICLES);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.language, "en");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "max_articles = 20\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_articles, 20);
        assert_eq!(config.fetch_timeout_secs, 15);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
max_articles = 30
fetch_timeout_secs = 5
max_redirects = 2
max_feed_candidates = 3
user_agent = "test-agent"
allow_private_hosts = true
language = "de"
output_dir = "/srv/site"
concurrency = 8
sources = ["https://example.com/", "https://example.org/blog"]
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.output_dir, PathBuf::from("/srv/site"));

        let extract = config.extract_config();
        assert_eq!(extract.max_articles, 30);
        assert_eq!(extract.fetch_timeout, Duration::from_secs(5));
        assert_eq!(extract.max_redirects, 2);
        assert_eq!(extract.max_feed_candidates, 3);
        assert_eq!(extract.user_agent, "test-agent");
        assert_eq!(extract.host_policy, HostPolicy::AllowPrivate);
        assert_eq!(extract.language, "de");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "max_articles = 10\ntheme = \"dark\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_articles, 10);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "max_articles = \"many\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let config = Config {
            max_articles: 0,
            fetch_timeout_secs: 0,
            ..Default::default()
        };
        let extract = config.extract_config();
        assert_eq!(extract.max_articles, 1);
        assert_eq!(extract.fetch_timeout, Duration::from_secs(1));
    }
}
