//! Data model shared by every pipeline stage.
//!
//! Remote records ([`RemoteHistoricalPost`]) are what the provider reports and are never
//! mutated here. Local records ([`LocalPost`], [`PostVariant`], [`MediaItem`]) are what the
//! importer appends to the post store. [`Account`] is the only pre-existing local record the
//! pipeline touches, and only its avatar/display fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform keys known to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "x")]
    Twitter,
    Facebook,
    Instagram,
    Linkedin,
    Tiktok,
    Youtube,
    Pinterest,
    Reddit,
    Threads,
    Bluesky,
    Telegram,
    Gmb,
}

impl Platform {
    pub const ALL: [Platform; 12] = [
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Tiktok,
        Platform::Youtube,
        Platform::Pinterest,
        Platform::Reddit,
        Platform::Threads,
        Platform::Bluesky,
        Platform::Telegram,
        Platform::Gmb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
            Platform::Pinterest => "pinterest",
            Platform::Reddit => "reddit",
            Platform::Threads => "threads",
            Platform::Bluesky => "bluesky",
            Platform::Telegram => "telegram",
            Platform::Gmb => "gmb",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown platform '{}'", self.0)
    }
}

impl std::error::Error for UnknownPlatform {}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if key == "x" {
            return Ok(Platform::Twitter);
        }
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

/// Status values the provider reports for a historical post (also usable as a history filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Error,
    Pending,
    Deleted,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Success => "success",
            HistoryStatus::Error => "error",
            HistoryStatus::Pending => "pending",
            HistoryStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(HistoryStatus::Success),
            "error" => Ok(HistoryStatus::Error),
            "pending" => Ok(HistoryStatus::Pending),
            "deleted" => Ok(HistoryStatus::Deleted),
            other => Err(format!("unknown history status '{other}'")),
        }
    }
}

/// Per-destination publish result of a remote post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationResult {
    pub platform: Platform,
    /// The platform's own id for the published post, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    #[serde(default)]
    pub is_video: bool,
}

/// A previously published post as reported by the provider, after boundary validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHistoricalPost {
    /// Provider-assigned post id; the dedup key.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    pub content: String,
    pub created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HistoryStatus>,
    pub post_ids: Vec<DestinationResult>,
    pub media_urls: Vec<String>,
}

impl RemoteHistoricalPost {
    /// First destination entry published to `platform`.
    pub fn destination_for(&self, platform: Platform) -> Option<&DestinationResult> {
        self.post_ids.iter().find(|d| d.platform == platform)
    }
}

/// Reference to a binary object persisted by a [`crate::contract::BlobStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub id: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A locally stored media attachment, exclusively owned by one [`PostVariant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaItem {
    Image {
        blob: BlobRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    Video {
        blob: BlobRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
}

impl MediaItem {
    pub fn new(kind: MediaKind, blob: BlobRef) -> Self {
        match kind {
            MediaKind::Image => MediaItem::Image { blob, alt: None },
            MediaKind::Video => MediaItem::Video { blob, alt: None },
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaItem::Image { .. } => MediaKind::Image,
            MediaItem::Video { .. } => MediaKind::Video,
        }
    }

    pub fn blob(&self) -> &BlobRef {
        match self {
            MediaItem::Image { blob, .. } | MediaItem::Video { blob, .. } => blob,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

/// The platform-specific rendering of a [`LocalPost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostVariant {
    pub text: String,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    pub status: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_url: Option<String>,
}

/// A durable local post. The map type keeps at most one variant per platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPost {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub variants: BTreeMap<Platform, PostVariant>,
}

impl LocalPost {
    pub fn variant(&self, platform: Platform) -> Option<&PostVariant> {
        self.variants.get(&platform)
    }
}

/// A connected platform identity inside an account group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub platform: Platform,
    pub profile_key: String,
    pub linked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Account {
    pub fn linked(platform: Platform, profile_key: impl Into<String>) -> Self {
        Self {
            platform,
            profile_key: profile_key.into(),
            linked: true,
            avatar_url: None,
            display_name: None,
        }
    }
}
