use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
///
/// These errors cover both parsing failures and security policy violations
/// designed to prevent SSRF (Server-Side Request Forgery) attacks.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Host policy applied on top of the http/https scheme check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPolicy {
    /// Reject localhost and private ranges (default for user-supplied URLs).
    PublicOnly,
    /// Accept any host; used for intranet sources and local test servers.
    AllowPrivate,
}

/// Validates a URL string for use as an extraction source or feed candidate.
///
/// Always rejects non-HTTP(S) schemes and host-less URLs. With
/// [`HostPolicy::PublicOnly`] it also rejects:
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`)
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6)
///
/// # Examples
///
/// ```
/// use sitefeed::util::{validate_url, HostPolicy};
///
/// let url = validate_url("https://example.com/blog", HostPolicy::PublicOnly).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("ftp://example.com", HostPolicy::AllowPrivate).is_err());
/// assert!(validate_url("http://localhost/", HostPolicy::PublicOnly).is_err());
/// assert!(validate_url("http://localhost/", HostPolicy::AllowPrivate).is_ok());
/// ```
pub fn validate_url(url_str: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;
    check_url(&url, policy)?;
    Ok(url)
}

/// Applies the scheme and host policy to an already-parsed URL.
pub fn check_url(url: &Url, policy: HostPolicy) -> Result<(), UrlValidationError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.is_empty() {
        return Err(UrlValidationError::MissingHost);
    }

    if policy == HostPolicy::AllowPrivate {
        return Ok(());
    }

    if host == "localhost" {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

/// Resolves `href` against `base`, keeping only absolute http/https results.
///
/// Fragments are dropped so `/post#comments` and `/post` resolve to the same
/// article URL.
pub fn resolve_url(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => {}
        _ => return None,
    }
    resolved.host_str()?;
    resolved.set_fragment(None);
    Some(resolved)
}

/// Canonical form of a source URL, used as the stable rule-storage key.
///
/// Parsing already lowercases the scheme and host, drops default ports and
/// normalizes the path; on top of that the fragment is removed. Strings that
/// do not parse are returned trimmed so lookups still behave deterministically.
pub fn canonicalize_url(url_str: &str) -> String {
    match Url::parse(url_str.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => url_str.trim().to_owned(),
    }
}
