//! Deduplicator: split a fetched batch into what is already local and what must be imported.
//!
//! The match key is the provider post id stored on each platform variant. Nothing below the
//! importer enforces uniqueness, so this partition must run before any post is created.

use std::collections::HashSet;

use crate::model::{LocalPost, Platform, RemoteHistoricalPost};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub already_imported: Vec<RemoteHistoricalPost>,
    pub to_import: Vec<RemoteHistoricalPost>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.already_imported.len() + self.to_import.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `batch` against the provider ids already present on `platform` variants of
/// `existing`. Provider order is kept. A repeated id inside `batch` counts as already
/// imported after its first occurrence.
pub fn partition(
    existing: &[LocalPost],
    platform: Platform,
    batch: Vec<RemoteHistoricalPost>,
) -> Partition {
    let mut seen: HashSet<String> = existing
        .iter()
        .filter_map(|post| post.variant(platform))
        .filter_map(|variant| variant.provider_post_id.clone())
        .collect();

    let mut result = Partition::default();
    for remote in batch {
        if seen.insert(remote.id.clone()) {
            result.to_import.push(remote);
        } else {
            tracing::debug!(provider_post_id = %remote.id, platform = %platform, "[DEDUP] Already imported");
            result.already_imported.push(remote);
        }
    }
    result
}
