//! # contract: trait seams between the pipeline and the outside world
//!
//! The pipeline never talks to the provider, the network or the post store directly. It goes
//! through the traits in this module so that the CLI can plug in real clients and the tests can
//! plug in `mockall` mocks (exported with the default `test-export-mocks` feature).
//!
//! - [`HistoryProvider`]: the provider's History and Profile endpoints, returning raw payloads.
//!   Validation into typed records happens in [`crate::history`].
//! - [`MediaFetcher`]: downloads the bytes behind a media URL.
//! - [`BlobStore`]: persists downloaded bytes and hands back a [`BlobRef`].
//! - [`PostStore`] / [`AccountStore`]: the local post collection and account records.
//!
//! Provider and media traits return the typed errors from [`crate::error`]; store traits return
//! a boxed [`StoreError`] since every backing store fails in its own way.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

pub use crate::error::StoreError;
use crate::error::{FetchError, MediaError};
use crate::model::{Account, BlobRef, HistoryStatus, LocalPost, Platform};

/// Optional filters forwarded to the History endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<HistoryStatus>,
}

/// One History endpoint call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub platform: Platform,
    pub profile_key: String,
    pub filter: HistoryFilter,
}

/// A destination entry exactly as the provider sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDestination {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub post_url: Option<String>,
    #[serde(default)]
    pub is_video: Option<bool>,
}

/// A history record exactly as the provider sent it. Every field is optional here;
/// [`crate::history::validate_record`] decides what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistoryRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default, alias = "post")]
    pub content: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub post_ids: Vec<RawDestination>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

/// Body of a History response: either a bare array or wrapped in `history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryPayload {
    List(Vec<RawHistoryRecord>),
    Wrapped { history: Vec<RawHistoryRecord> },
}

impl HistoryPayload {
    pub fn into_records(self) -> Vec<RawHistoryRecord> {
        match self {
            HistoryPayload::List(records) | HistoryPayload::Wrapped { history: records } => {
                records
            }
        }
    }
}

/// Per-platform display data from the Profile endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDisplayName {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_image: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    #[serde(default)]
    pub display_names: Vec<RawDisplayName>,
}

/// Bytes behind a media URL, plus the response content type when the server sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// The provider's History and Profile endpoints.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetch previously published posts. Non-2xx responses must come back as
    /// [`FetchError::Api`], never as an empty payload.
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryPayload, FetchError>;

    /// Fetch profile display data for every platform linked under `profile_key`.
    async fn fetch_profile(&self, profile_key: &str) -> Result<ProfilePayload, FetchError>;
}

/// Downloads remote media.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, MediaError>;
}

/// Durable storage for binary media.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<BlobRef, StoreError>;
}

/// The local, append-only view of the post collection used by the importer.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts, in collection order.
    async fn list_posts(&self) -> Result<Vec<LocalPost>, StoreError>;

    /// Append one post to the end of the collection.
    async fn append_post(&self, post: LocalPost) -> Result<(), StoreError>;

    /// Append `post` unless a post already carries the same provider post id on its
    /// `platform` variant. The check and the append happen under one lock, so concurrent
    /// runs cannot both import the same provider post. Returns `false` when skipped.
    async fn append_post_if_absent(
        &self,
        platform: Platform,
        post: LocalPost,
    ) -> Result<bool, StoreError>;
}

/// Whether `posts` already holds `provider_post_id` on a `platform` variant.
pub fn holds_provider_post(
    posts: &[LocalPost],
    platform: Platform,
    provider_post_id: &str,
) -> bool {
    posts.iter().any(|p| {
        p.variant(platform)
            .and_then(|v| v.provider_post_id.as_deref())
            == Some(provider_post_id)
    })
}

/// Account records, keyed by profile key and platform.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(
        &self,
        profile_key: &str,
        platform: Platform,
    ) -> Result<Option<Account>, StoreError>;

    /// Insert the account, or replace the one with the same profile key and platform.
    async fn upsert_account(&self, account: Account) -> Result<(), StoreError>;
}
