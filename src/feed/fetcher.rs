use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::ExtractConfig;
use crate::util::{check_url, HostPolicy};

/// Errors that can occur while fetching a page or a feed candidate.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, redirect limit, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response outside the 2xx-3xx range after redirects
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Page response whose Content-Type is not HTML
    #[error("Not an HTML page (content-type: {0})")]
    NotHtml(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// HTTP access for one extractor: a shared client plus the configured limits.
///
/// The client carries the user agent and redirect policy; every request is
/// additionally wrapped in a timeout covering both headers and body.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl Fetcher {
    /// Builds a client from `config`.
    pub fn new(config: &ExtractConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(create_redirect_policy(config.max_redirects, config.host_policy))
            .timeout(config.fetch_timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    fn with_client(client: reqwest::Client, config: &ExtractConfig) -> Self {
        Self {
            client,
            timeout: config.fetch_timeout,
            max_bytes: config.max_response_bytes,
        }
    }

    /// Fetches a page and returns its body as text.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Connection, TLS or redirect-limit errors
    /// - [`FetchError::Timeout`] - The request exceeded the configured timeout
    /// - [`FetchError::HttpStatus`] - Final response outside 2xx-3xx
    /// - [`FetchError::NotHtml`] - Content-Type missing or not HTML
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
    pub async fn fetch_html(&self, url: &Url) -> Result<String, FetchError> {
        let bytes = self.fetch(url, true).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetches raw bytes (feed candidates); no Content-Type requirement.
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.fetch(url, false).await
    }

    async fn fetch(&self, url: &Url, require_html: bool) -> Result<Vec<u8>, FetchError> {
        tokio::time::timeout(self.timeout, self.send_and_read(url, require_html))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }

    async fn send_and_read(&self, url: &Url, require_html: bool) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        if require_html {
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_lowercase();
            if !is_html_content_type(&content_type) {
                return Err(FetchError::NotHtml(if content_type.is_empty() {
                    "missing".to_owned()
                } else {
                    content_type
                }));
            }
        }

        read_limited_bytes(response, self.max_bytes).await
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type.contains("text/html") || content_type.contains("application/xhtml")
}

/// Caps redirect hops, rejects loops, and holds every hop to `host_policy`.
fn create_redirect_policy(max_redirects: usize, host_policy: HostPolicy) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error(format!("Too many redirects (max {max_redirects})"));
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        if let Err(e) = check_url(url, host_policy) {
            tracing::warn!(to = %url, error = %e, "Refusing redirect");
            return attempt.error(e);
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
