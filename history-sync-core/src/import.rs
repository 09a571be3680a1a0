//! Importer: turn deduplicated remote records into [`LocalPost`]s and append them.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::contract::{BlobStore, MediaFetcher, PostStore};
use crate::dedup::{self, Partition};
use crate::error::SyncError;
use crate::media;
use crate::model::{LocalPost, MediaItem, Platform, PostStatus, PostVariant, RemoteHistoricalPost};

pub const TITLE_MAX_CHARS: usize = 50;
const UNTITLED: &str = "Untitled post";

/// Counts for one import run. On every `Ok` run, `imported + skipped` equals the batch size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    /// Per-item problems that did not stop the run (e.g. dropped media).
    pub errors: Vec<String>,
    /// Local ids of the posts appended by this run, in append order.
    pub imported_post_ids: Vec<String>,
}

/// First [`TITLE_MAX_CHARS`] characters of the whitespace-collapsed content.
pub fn derive_title(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return UNTITLED.to_string();
    }
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", truncated.trim_end())
}

/// Build the local record for `remote` with an already materialized media list.
pub fn build_local_post(
    remote: &RemoteHistoricalPost,
    platform: Platform,
    media: Vec<MediaItem>,
) -> LocalPost {
    let destination = remote.destination_for(platform);
    let variant = PostVariant {
        text: remote.content.clone(),
        media,
        status: PostStatus::Published,
        published_at: Some(remote.created),
        provider_post_id: Some(remote.id.clone()),
        social_url: destination.and_then(|d| d.post_url.clone()),
    };
    let mut variants = BTreeMap::new();
    variants.insert(platform, variant);
    LocalPost {
        id: Uuid::new_v4().to_string(),
        title: derive_title(&remote.content),
        created_at: Utc::now(),
        variants,
    }
}

/// Import the `to_import` side of a partition; the other side is counted as skipped.
///
/// Media failures are recorded in the report and the post is imported without that item.
/// A post another run appended in the meantime is counted as skipped. A store append failure
/// aborts the run.
pub async fn import_partition(
    posts: &dyn PostStore,
    fetcher: &dyn MediaFetcher,
    blobs: &dyn BlobStore,
    platform: Platform,
    partition: Partition,
    config: &MediaConfig,
) -> Result<ImportReport, SyncError> {
    let mut report = ImportReport {
        skipped: partition.already_imported.len(),
        ..ImportReport::default()
    };

    for remote in partition.to_import {
        let video_hint = remote
            .destination_for(platform)
            .map(|d| d.is_video)
            .unwrap_or(false);
        let materialized =
            media::materialize_all(fetcher, blobs, &remote.media_urls, video_hint, config).await;
        for (url, e) in &materialized.failures {
            report
                .errors
                .push(format!("post {}: media {url}: {e}", remote.id));
        }

        let local = build_local_post(&remote, platform, materialized.items);
        let local_id = local.id.clone();
        let media_count = local.variant(platform).map(|v| v.media.len()).unwrap_or(0);
        match posts.append_post_if_absent(platform, local).await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    provider_post_id = %remote.id,
                    platform = %platform,
                    "[IMPORT] Provider post imported by a concurrent run, skipping"
                );
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                error!(provider_post_id = %remote.id, error = %e, "[IMPORT][ERROR] append_post failed");
                return Err(SyncError::Store(e));
            }
        }
        info!(
            provider_post_id = %remote.id,
            local_id = %local_id,
            platform = %platform,
            media = media_count,
            "[IMPORT] Imported post"
        );
        report.imported += 1;
        report.imported_post_ids.push(local_id);
    }

    Ok(report)
}

/// Deduplicate `batch` against the store's current contents, then import what is new.
pub async fn import_history(
    posts: &dyn PostStore,
    fetcher: &dyn MediaFetcher,
    blobs: &dyn BlobStore,
    platform: Platform,
    batch: Vec<RemoteHistoricalPost>,
    config: &MediaConfig,
) -> Result<ImportReport, SyncError> {
    let existing = posts.list_posts().await.map_err(SyncError::Store)?;
    let partition = dedup::partition(&existing, platform, batch);
    info!(
        platform = %platform,
        to_import = partition.to_import.len(),
        already_imported = partition.already_imported.len(),
        "[IMPORT] Partitioned batch"
    );
    import_partition(posts, fetcher, blobs, platform, partition, config).await
}
