// Helper functions for the HTTP client

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::client::errors::ClientError;
use crate::config::ClientConfig;

/// Build a reqwest client honouring the configured proxy and timeout
pub fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::InvalidUrl(format!("proxy {}: {}", proxy_url, e)))?;
        tracing::info!("[HttpClient] Using proxy: {}", proxy_url);
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ClientError::Unknown(format!("Failed to build HTTP client: {}", e)))
}

/// Longest stem kept from the URL's file name
const MAX_STEM_CHARS: usize = 80;

/// Hex digits of the URL digest appended to the stem
const URL_DIGEST_CHARS: usize = 12;

/// Local file name for a download URL.
///
/// The last path segment is sanitized (anything outside `[A-Za-z0-9._-]`
/// becomes `_`) and split into stem and extension. The stem is truncated and
/// suffixed with a digest of the full URL, so equally named clips from
/// different server directories never share a local file. Falls back to a
/// `video-<digest>.mp4` name when the URL has no usable segment.
pub fn local_file_name(http_url: &str) -> String {
    lazy_static::lazy_static! {
        static ref UNSAFE_RE: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
    }

    let segment = reqwest::Url::parse(http_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let cleaned = UNSAFE_RE.replace_all(&segment, "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    let (stem, extension) = match cleaned.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext))
        }
        _ if cleaned.is_empty() => ("video", Some("mp4")),
        _ => (cleaned, None),
    };

    let stem: String = stem
        .trim_end_matches(|c| c == '.' || c == '_')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = if stem.is_empty() { "video".to_string() } else { stem };

    let digest = Sha256::digest(http_url.as_bytes());
    let digest = format!("{digest:x}");
    let digest = &digest[..URL_DIGEST_CHARS];

    match extension {
        Some(ext) => format!("{}-{}.{}", stem, digest, ext),
        None => format!("{}-{}", stem, digest),
    }
}

/// Temporary file a download streams into before it is renamed to `target`.
///
/// Unique per call, so two downloads of the same URL never write the same file.
pub fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(format!(".{}.part", Uuid::new_v4().simple()));
    PathBuf::from(name)
}

/// Whole-number download percentage, when the total size is known
pub fn percent_of(done: u64, total: Option<u64>) -> Option<f32> {
    match total {
        Some(total) if total > 0 => Some((done.min(total) as f64 * 100.0 / total as f64) as f32),
        _ => None,
    }
}
