use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::HistoryFilter;
use crate::model::Platform;

/// Tuning for one synchronisation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Skip the remote fetch for a platform once this many local posts already carry a
    /// variant for it. `None` always fetches.
    #[serde(default)]
    pub skip_fetch_when_local_at_least: Option<usize>,
    /// Default History filter, overridable per request.
    #[serde(default)]
    pub history: HistoryFilter,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Total attempts per media URL, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before retry `n` is `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Largest media body accepted; bigger downloads are dropped.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_bytes() -> u64 {
    256 * 1024 * 1024
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// A group of linked social accounts sharing one provider profile key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountGroup {
    pub id: String,
    pub profile_key: String,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            skip_fetch_when_local_at_least = ?self.skip_fetch_when_local_at_least,
            media_max_attempts = self.media.max_attempts,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
