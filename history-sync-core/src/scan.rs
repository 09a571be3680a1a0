//! Local Store Scanner: what the local collection already holds for a platform.

use std::collections::{BTreeSet, HashSet};

use crate::model::{LocalPost, Platform};

/// Local coverage of one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Number of local posts carrying a variant for the platform.
    pub count: usize,
    /// Ids of those local posts.
    pub post_ids: BTreeSet<String>,
    /// Provider post ids recorded on those variants.
    pub provider_post_ids: HashSet<String>,
}

pub fn scan_platform(posts: &[LocalPost], platform: Platform) -> ScanSummary {
    let mut summary = ScanSummary::default();
    for post in posts {
        let Some(variant) = post.variant(platform) else {
            continue;
        };
        summary.count += 1;
        summary.post_ids.insert(post.id.clone());
        if let Some(provider_id) = &variant.provider_post_id {
            summary.provider_post_ids.insert(provider_id.clone());
        }
    }
    summary
}

/// Quota gate: with a threshold configured, skip the remote fetch once local coverage reaches it.
pub fn should_fetch(summary: &ScanSummary, skip_when_local_at_least: Option<usize>) -> bool {
    match skip_when_local_at_least {
        Some(threshold) => summary.count < threshold,
        None => true,
    }
}
