//! Remote History Fetcher.
//!
//! Calls the provider through [`HistoryProvider`] and validates the raw payload into
//! [`RemoteHistoricalPost`] records. Records that cannot be deduplicated (no id) or ordered
//! (no parseable timestamp) are rejected here, so nothing downstream has to handle them.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::contract::{
    HistoryFilter, HistoryProvider, HistoryRequest, RawDestination, RawHistoryRecord,
};
use crate::error::FetchError;
use crate::model::{DestinationResult, HistoryStatus, Platform, RemoteHistoricalPost};

/// Reject filter values the provider would reject anyway.
pub fn validate_filter(filter: &HistoryFilter) -> Result<(), FetchError> {
    if filter.limit == Some(0) {
        return Err(FetchError::InvalidFilter("limit must be greater than 0".into()));
    }
    if filter.last_days == Some(0) {
        return Err(FetchError::InvalidFilter(
            "lastDays must be greater than 0".into(),
        ));
    }
    Ok(())
}

/// Fetch and validate the history for one platform.
///
/// `Ok(vec![])` means the provider answered with no posts; every failure is an `Err`.
pub async fn fetch_history(
    provider: &dyn HistoryProvider,
    platform: Platform,
    profile_key: &str,
    filter: &HistoryFilter,
) -> Result<Vec<RemoteHistoricalPost>, FetchError> {
    let records = fetch_raw_history(provider, platform, profile_key, filter).await?;
    Ok(validate_records(platform, records))
}

/// Fetch the history payload without validating it (used for raw inspection).
pub async fn fetch_raw_history(
    provider: &dyn HistoryProvider,
    platform: Platform,
    profile_key: &str,
    filter: &HistoryFilter,
) -> Result<Vec<RawHistoryRecord>, FetchError> {
    validate_filter(filter)?;
    let request = HistoryRequest {
        platform,
        profile_key: profile_key.to_string(),
        filter: filter.clone(),
    };
    info!(
        platform = %platform,
        limit = ?filter.limit,
        last_days = ?filter.last_days,
        status = ?filter.status,
        "[FETCH] Requesting remote post history"
    );
    match provider.fetch_history(&request).await {
        Ok(payload) => {
            let records = payload.into_records();
            info!(platform = %platform, count = records.len(), "[FETCH] History received");
            Ok(records)
        }
        Err(e) => {
            warn!(platform = %platform, error = %e, "[FETCH] History fetch failed");
            Err(e)
        }
    }
}

/// Validate a batch of raw records, dropping (and logging) the malformed ones.
pub fn validate_records(
    platform: Platform,
    records: Vec<RawHistoryRecord>,
) -> Vec<RemoteHistoricalPost> {
    let total = records.len();
    let posts: Vec<RemoteHistoricalPost> = records
        .into_iter()
        .filter_map(|raw| match validate_record(raw) {
            Ok(post) => Some(post),
            Err(reason) => {
                warn!(platform = %platform, reason = %reason, "[FETCH] Rejected malformed history record");
                None
            }
        })
        .collect();
    if posts.len() < total {
        info!(
            platform = %platform,
            accepted = posts.len(),
            rejected = total - posts.len(),
            "[FETCH] Validated history payload"
        );
    }
    posts
}

/// Turn one raw record into a typed one, or explain why it is unusable.
pub fn validate_record(raw: RawHistoryRecord) -> Result<RemoteHistoricalPost, String> {
    let id = raw
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "record has no id".to_string())?;

    let created_raw = raw
        .created
        .ok_or_else(|| format!("record {id} has no created timestamp"))?;
    let created = parse_timestamp(&created_raw)
        .ok_or_else(|| format!("record {id} has unparseable created timestamp '{created_raw}'"))?;

    let status = match raw.status.as_deref() {
        None => None,
        Some(s) => match s.parse::<HistoryStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(id = %id, error = %e, "Ignoring unknown record status");
                None
            }
        },
    };

    let post_ids = raw
        .post_ids
        .into_iter()
        .filter_map(validate_destination)
        .collect();

    let media_urls = raw
        .media_urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    Ok(RemoteHistoricalPost {
        id,
        ref_id: raw.ref_id.filter(|r| !r.trim().is_empty()),
        content: raw.content.unwrap_or_default(),
        created,
        status,
        post_ids,
        media_urls,
    })
}

fn validate_destination(raw: RawDestination) -> Option<DestinationResult> {
    let platform = match raw.platform.as_deref()?.parse::<Platform>() {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "Dropping destination entry");
            return None;
        }
    };
    Some(DestinationResult {
        platform,
        id: raw.id,
        post_url: raw.post_url.filter(|u| !u.trim().is_empty()),
        is_video: raw.is_video.unwrap_or(false),
    })
}

/// RFC 3339 first, then a naive `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
