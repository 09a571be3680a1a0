//! High-level pipeline: orchestrates scan → fetch → dedup → materialize/import for one platform,
//! with the avatar sync running alongside.
//!
//! # Major Types
//! - [`SyncDeps`]: the trait objects a run talks to (provider, stores, media fetcher)
//! - [`SyncRequest`]: which platform/profile key to reconcile, and how
//! - [`SyncReport`]: what happened, including whether the history fetch failed
//!
//! # Responsibilities
//! - One linear pass per platform. A failed history fetch is reported in the
//!   [`SyncReport`] and leaves the post store untouched.
//! - Only a broken post store aborts a run ([`SyncError`]).
//! - [`synchronise_group`] repeats the pass for every linked platform of an
//!   [`AccountGroup`]; one failing platform never stops the others.
//!
//! # Navigation
//! - Main entrypoints: [`synchronise`], [`synchronise_group`]

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::avatar::{self, AvatarSyncOutcome};
use crate::config::{AccountGroup, SyncConfig};
use crate::contract::{AccountStore, BlobStore, HistoryFilter, HistoryProvider, MediaFetcher, PostStore};
use crate::dedup;
use crate::error::SyncError;
use crate::history;
use crate::import;
use crate::model::{Account, Platform};
use crate::scan;
use crate::store::MemoryStore;

/// Everything a run talks to.
#[derive(Clone)]
pub struct SyncDeps {
    pub provider: Arc<dyn HistoryProvider>,
    pub posts: Arc<dyn PostStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub media: Arc<dyn MediaFetcher>,
    pub blobs: Arc<dyn BlobStore>,
}

impl SyncDeps {
    /// Use one [`MemoryStore`] for posts, accounts and blobs.
    pub fn with_memory_store(
        provider: Arc<dyn HistoryProvider>,
        media: Arc<dyn MediaFetcher>,
        store: Arc<MemoryStore>,
    ) -> Self {
        Self {
            provider,
            posts: store.clone(),
            accounts: store.clone(),
            media,
            blobs: store,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub platform: Platform,
    pub profile_key: String,
    /// Per-request filter; unset fields fall back to [`SyncConfig::history`].
    pub filter: HistoryFilter,
    /// Fetch even when local coverage passes the configured threshold.
    pub force: bool,
    /// Partition only; nothing is downloaded, appended or updated.
    pub dry_run: bool,
    pub sync_avatar: bool,
}

impl SyncRequest {
    pub fn new(platform: Platform, profile_key: impl Into<String>) -> Self {
        Self {
            platform,
            profile_key: profile_key.into(),
            filter: HistoryFilter::default(),
            force: false,
            dry_run: false,
            sync_avatar: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub platform: Option<Platform>,
    pub local_count: usize,
    /// The scan gate decided local coverage was sufficient.
    pub fetch_skipped: bool,
    pub history_fetch_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
    pub fetched: usize,
    pub imported: usize,
    pub skipped: usize,
    /// Records a dry run would have imported.
    pub pending: usize,
    pub errors: Vec<String>,
    pub imported_post_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarSyncOutcome>,
}

fn merge_filter(request: &HistoryFilter, defaults: &HistoryFilter) -> HistoryFilter {
    HistoryFilter {
        limit: request.limit.or(defaults.limit),
        last_days: request.last_days.or(defaults.last_days),
        status: request.status.or(defaults.status),
    }
}

/// Reconcile the provider history of one platform into the local store.
pub async fn synchronise(
    deps: &SyncDeps,
    config: &SyncConfig,
    request: &SyncRequest,
) -> Result<SyncReport, SyncError> {
    let platform = request.platform;
    info!(platform = %platform, dry_run = request.dry_run, "[SYNC] Starting history synchronisation");

    let avatar_task = (request.sync_avatar && !request.dry_run).then(|| {
        avatar::spawn_avatar_sync(
            deps.provider.clone(),
            deps.accounts.clone(),
            platform,
            request.profile_key.clone(),
        )
    });

    let mut report = SyncReport {
        platform: Some(platform),
        ..SyncReport::default()
    };

    // --- Step 1: Scan local coverage ---
    let existing = deps.posts.list_posts().await.map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Failed to list local posts");
        SyncError::Store(e)
    })?;
    let summary = scan::scan_platform(&existing, platform);
    report.local_count = summary.count;

    if !request.force && !scan::should_fetch(&summary, config.skip_fetch_when_local_at_least) {
        info!(
            platform = %platform,
            local_count = summary.count,
            "[SYNC] Local coverage sufficient, skipping remote fetch"
        );
        report.fetch_skipped = true;
        if let Some(task) = avatar_task {
            report.avatar = Some(task.outcome().await);
        }
        return Ok(report);
    }

    // --- Step 2: Fetch ---
    let filter = merge_filter(&request.filter, &config.history);
    let batch = match history::fetch_history(
        deps.provider.as_ref(),
        platform,
        &request.profile_key,
        &filter,
    )
    .await
    {
        Ok(batch) => batch,
        Err(e) => {
            error!(platform = %platform, error = %e, "[SYNC][ERROR] History fetch failed, store left untouched");
            report.history_fetch_failed = true;
            report.fetch_error = Some(e.to_string());
            if let Some(task) = avatar_task {
                report.avatar = Some(task.outcome().await);
            }
            return Ok(report);
        }
    };
    report.fetched = batch.len();

    // --- Step 3: Dedup ---
    let partition = dedup::partition(&existing, platform, batch);
    info!(
        platform = %platform,
        to_import = partition.to_import.len(),
        already_imported = partition.already_imported.len(),
        "[SYNC] Partitioned fetched history"
    );

    // --- Step 4: Materialize and import ---
    if request.dry_run {
        report.skipped = partition.already_imported.len();
        report.pending = partition.to_import.len();
    } else {
        let imported = import::import_partition(
            deps.posts.as_ref(),
            deps.media.as_ref(),
            deps.blobs.as_ref(),
            platform,
            partition,
            &config.media,
        )
        .await?;
        report.imported = imported.imported;
        report.skipped = imported.skipped;
        report.errors = imported.errors;
        report.imported_post_ids = imported.imported_post_ids;
    }

    if let Some(task) = avatar_task {
        report.avatar = Some(task.outcome().await);
    }

    info!(
        platform = %platform,
        imported = report.imported,
        skipped = report.skipped,
        errors = report.errors.len(),
        "[SYNC] History synchronisation complete"
    );
    Ok(report)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupSyncOptions {
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSyncReport {
    pub group_id: String,
    /// Posts imported plus accounts whose avatar was updated.
    pub updated: usize,
    /// Platforms whose fetch failed or whose run was aborted.
    pub failed: usize,
    pub errors: Vec<String>,
    pub reports: Vec<SyncReport>,
}

impl GroupSyncReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Make sure an account record exists for a configured platform. Returns `false` when the
/// stored account is marked unlinked.
async fn ensure_account(
    accounts: &dyn AccountStore,
    profile_key: &str,
    platform: Platform,
    dry_run: bool,
) -> Result<bool, SyncError> {
    match accounts
        .get_account(profile_key, platform)
        .await
        .map_err(SyncError::Store)?
    {
        Some(account) => Ok(account.linked),
        None if dry_run => Ok(true),
        None => {
            info!(platform = %platform, "[SYNC] Registering linked account");
            accounts
                .upsert_account(Account::linked(platform, profile_key))
                .await
                .map_err(SyncError::Store)?;
            Ok(true)
        }
    }
}

/// Run [`synchronise`] for each linked platform of `group` (or the requested subset).
pub async fn synchronise_group(
    deps: &SyncDeps,
    config: &SyncConfig,
    group: &AccountGroup,
    platforms: Option<&[Platform]>,
    options: GroupSyncOptions,
) -> GroupSyncReport {
    let mut report = GroupSyncReport {
        group_id: group.id.clone(),
        ..GroupSyncReport::default()
    };

    let selected: Vec<Platform> = match platforms {
        Some(requested) => {
            for p in requested.iter().filter(|p| !group.platforms.contains(*p)) {
                warn!(group = %group.id, platform = %p, "[SYNC] Platform not linked in group");
                report
                    .errors
                    .push(format!("{p}: platform is not linked in group {}", group.id));
            }
            requested
                .iter()
                .copied()
                .filter(|p| group.platforms.contains(p))
                .collect()
        }
        None => group.platforms.clone(),
    };

    for platform in selected {
        match ensure_account(
            deps.accounts.as_ref(),
            &group.profile_key,
            platform,
            options.dry_run,
        )
        .await {
            Ok(true) => {}
            Ok(false) => {
                info!(group = %group.id, platform = %platform, "[SYNC] Account unlinked, skipping");
                continue;
            }
            Err(e) => {
                report.failed += 1;
                report.errors.push(format!("{platform}: aborted: {e}"));
                continue;
            }
        }

        let request = SyncRequest {
            force: options.force,
            dry_run: options.dry_run,
            ..SyncRequest::new(platform, group.profile_key.clone())
        };
        match synchronise(deps, config, &request).await {
            Ok(platform_report) => {
                if let Some(e) = &platform_report.fetch_error {
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{platform}: history fetch failed: {e}"));
                }
                report.errors.extend(
                    platform_report
                        .errors
                        .iter()
                        .map(|e| format!("{platform}: {e}")),
                );
                report.updated += platform_report.imported;
                if platform_report
                    .avatar
                    .as_ref()
                    .is_some_and(AvatarSyncOutcome::is_updated)
                {
                    report.updated += 1;
                }
                report.reports.push(platform_report);
            }
            Err(e) => {
                error!(group = %group.id, platform = %platform, error = %e, "[SYNC][ERROR] Platform sync aborted");
                report.failed += 1;
                report.errors.push(format!("{platform}: aborted: {e}"));
            }
        }
    }

    report
}
