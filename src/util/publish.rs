use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

use super::canonicalize_url;

/// Directory every published document lives under.
pub const PUBLISH_ROOT: &str = "feeds";

/// Deterministic publish location for a source's feed document.
///
/// The path is `feeds/{sanitized-host}/{hash}.xml`, where `hash` is the first
/// 16 hex characters of the SHA-256 of the canonicalized source URL. The hash
/// never depends on the document contents, so the same source always lands on
/// the same path across runs.
///
/// # Examples
///
/// ```
/// use sitefeed::util::publish_path;
///
/// let a = publish_path("https://Example.com/news");
/// let b = publish_path("https://example.com/news#latest");
/// assert_eq!(a, b);
/// assert!(a.starts_with("feeds/example.com"));
/// ```
pub fn publish_path(source_url: &str) -> PathBuf {
    let canonical = canonicalize_url(source_url);
    let host = Url::parse(&canonical)
        .ok()
        .and_then(|u| u.host_str().map(sanitize_host))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown-host".to_owned());

    PathBuf::from(PUBLISH_ROOT)
        .join(host)
        .join(format!("{}.xml", source_hash(&canonical)))
}

/// First 8 bytes of SHA-256 over the URL, as 16 lowercase hex characters.
fn source_hash(canonical_url: &str) -> String {
    let digest = Sha256::digest(canonical_url.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Lowercases a host and replaces anything outside `[a-z0-9.-]` with `-`.
fn sanitize_host(host: &str) -> String {
    host.to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Writes `content` to `path` via write-to-temp-then-rename, creating parent
/// directories as needed. Readers never observe a partially written document.
pub fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }

    // Unpredictable temp name so nothing can be planted at it beforehand.
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write temporary file '{}'", temp_path.display())
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to sync temporary file '{}' to disk", temp_path.display())
    })?;

    drop(file);

    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!("Failed to remove existing '{}' before replace", path.display())
        })?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_shape() {
        let path = publish_path("https://blog.example.com/posts");
        let parts: Vec<_> = path.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "feeds");
        assert_eq!(parts[1], "blog.example.com");
        let file = &parts[2];
        assert!(file.ends_with(".xml"));
        let stem = file.trim_end_matches(".xml");
        assert_eq!(stem.len(), 16);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_path_is_stable_and_source_specific() {
        assert_eq!(
            publish_path("https://example.com/a"),
            publish_path("https://example.com/a")
        );
        assert_ne!(
            publish_path("https://example.com/a"),
            publish_path("https://example.com/b")
        );
    }

    #[test]
    fn test_sanitize_ipv6_host() {
        assert_eq!(sanitize_host("[::1]"), "---1-");
    }

    #[test]
    fn test_unparseable_source_still_gets_path() {
        let path = publish_path("not a url");
        assert!(path.starts_with("feeds/unknown-host"));
    }

    #[test]
    fn test_write_atomically_creates_dirs_and_replaces() {
        let root = std::env::temp_dir().join(format!("sitefeed-publish-test-{}", std::process::id()));
        let target = root.join(publish_path("https://example.com/news"));

        write_atomically(&target, b"first").unwrap();
        write_atomically(&target, b"second").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        let siblings = std::fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(siblings, 1);

        let _ = std::fs::remove_dir_all(&root);
    }
}
