//! Media Materializer: remote media URL → local blob → typed [`MediaItem`].
//!
//! The URL classifier is a best-effort guess (extension, then the destination's video flag,
//! then substring hints). The response `Content-Type` is authoritative when it names an image
//! or a video, and rejects the item when it names anything else.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::MediaConfig;
use crate::contract::{BlobStore, FetchedMedia, MediaFetcher};
use crate::error::MediaError;
use crate::model::{MediaItem, MediaKind};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "avi", "mkv", "mpeg", "mpg", "m3u8"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "bmp", "svg", "avif"];

fn extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.([A-Za-z0-9]{2,5})$").unwrap())
}

/// Path component of `url` without query or fragment.
fn url_path(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

fn url_extension(url: &str) -> Option<String> {
    let path = url_path(url);
    extension_re()
        .captures(&path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Guess whether `url` points at an image or a video.
pub fn classify_url(url: &str, video_hint: bool) -> MediaKind {
    if let Some(ext) = url_extension(url) {
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            return MediaKind::Video;
        }
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return MediaKind::Image;
        }
    }
    if video_hint {
        return MediaKind::Video;
    }
    let lower = url.to_ascii_lowercase();
    if lower.contains("video") || lower.contains("/v/") || lower.contains(".m3u8") {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

/// Content type to record for a blob whose server did not send a usable one.
pub fn guess_content_type(url: &str, kind: MediaKind) -> String {
    let ext = url_extension(url);
    match (kind, ext.as_deref()) {
        (MediaKind::Image, Some("jpg")) | (MediaKind::Image, Some("jpeg")) => "image/jpeg".into(),
        (MediaKind::Image, Some("svg")) => "image/svg+xml".into(),
        (MediaKind::Image, Some(ext)) if IMAGE_EXTENSIONS.contains(&ext) => format!("image/{ext}"),
        (MediaKind::Image, _) => "image/jpeg".into(),
        (MediaKind::Video, Some("mov")) => "video/quicktime".into(),
        (MediaKind::Video, Some("m3u8")) => "application/vnd.apple.mpegurl".into(),
        (MediaKind::Video, Some(ext)) if VIDEO_EXTENSIONS.contains(&ext) => format!("video/{ext}"),
        (MediaKind::Video, _) => "video/mp4".into(),
    }
}

/// Decide the final kind and content type from the URL guess and the response header.
fn resolve_kind(
    url: &str,
    guessed: MediaKind,
    content_type: Option<&str>,
) -> Result<(MediaKind, String), MediaError> {
    let essence = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());
    match essence.as_deref() {
        Some(ct) if ct.starts_with("image/") => Ok((MediaKind::Image, ct.to_string())),
        Some(ct) if ct.starts_with("video/") => Ok((MediaKind::Video, ct.to_string())),
        None | Some("application/octet-stream") | Some("binary/octet-stream") => {
            Ok((guessed, guess_content_type(url, guessed)))
        }
        Some(ct) => Err(MediaError::UnsupportedContent(ct.to_string())),
    }
}

/// Fetch with bounded retries on transient failures.
async fn fetch_with_retry(
    fetcher: &dyn MediaFetcher,
    url: &str,
    config: &MediaConfig,
) -> Result<FetchedMedia, MediaError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match fetcher.fetch(url).await {
            Ok(media) => return Ok(media),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    url,
                    error = %e,
                    attempt,
                    max_attempts,
                    "[MEDIA] Download failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(
                    config.retry_backoff_ms * attempt as u64,
                ))
                .await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Download one media URL and persist it as a blob.
pub async fn materialize(
    fetcher: &dyn MediaFetcher,
    blobs: &dyn BlobStore,
    url: &str,
    video_hint: bool,
    config: &MediaConfig,
) -> Result<MediaItem, MediaError> {
    let guessed = classify_url(url, video_hint);
    debug!(url, kind = ?guessed, "[MEDIA] Classified media URL");

    let fetched = fetch_with_retry(fetcher, url, config).await?;
    let (kind, content_type) = resolve_kind(url, guessed, fetched.content_type.as_deref())?;
    if kind != guessed {
        debug!(url, guessed = ?guessed, actual = ?kind, "[MEDIA] Content type overrides URL guess");
    }

    let size = fetched.bytes.len();
    let blob = blobs
        .put(fetched.bytes, &content_type)
        .await
        .map_err(|e| MediaError::Store(e.to_string()))?;
    info!(url, blob_id = %blob.id, size, kind = ?kind, "[MEDIA] Stored media blob");
    Ok(MediaItem::new(kind, blob))
}

/// Outcome of materializing every media URL of one post.
#[derive(Debug, Default)]
pub struct MaterializedMedia {
    pub items: Vec<MediaItem>,
    pub failures: Vec<(String, MediaError)>,
}

/// Materialize all `urls` concurrently. Failed URLs are logged and reported, never fatal;
/// successful items keep the order of `urls`.
pub async fn materialize_all(
    fetcher: &dyn MediaFetcher,
    blobs: &dyn BlobStore,
    urls: &[String],
    video_hint: bool,
    config: &MediaConfig,
) -> MaterializedMedia {
    let results = join_all(
        urls.iter()
            .map(|url| materialize(fetcher, blobs, url, video_hint, config)),
    )
    .await;

    let mut out = MaterializedMedia::default();
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(item) => out.items.push(item),
            Err(e) => {
                error!(url = %url, error = %e, "[MEDIA][ERROR] Dropping media item");
                out.failures.push((url.clone(), e));
            }
        }
    }
    out
}

/// [`MediaFetcher`] over plain HTTP GET. Bodies are read chunk by chunk and abandoned once
/// they pass `max_bytes`.
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Network(e.to_string()))?;
        Ok(Self {
            client,
            max_bytes: MediaConfig::default().max_bytes,
        })
    }

    pub fn from_config(config: &MediaConfig) -> Result<Self, MediaError> {
        Ok(Self::new(Duration::from_secs(config.timeout_secs))?.with_max_bytes(config.max_bytes))
    }

    pub fn with_max_bytes(self, max_bytes: u64) -> Self {
        Self { max_bytes, ..self }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, MediaError> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MediaError::Status {
                status: status.as_u16(),
            });
        }

        let limit = self.max_bytes;
        if resp.content_length().is_some_and(|len| len > limit) {
            warn!(url, limit, "[MEDIA] Declared body size over limit");
            return Err(MediaError::TooLarge { limit });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?
        {
            if (bytes.len() + chunk.len()) as u64 > limit {
                warn!(url, limit, "[MEDIA] Body exceeded size limit while streaming");
                return Err(MediaError::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(FetchedMedia {
            bytes,
            content_type,
        })
    }
}
