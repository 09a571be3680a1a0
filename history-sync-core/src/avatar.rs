//! Profile Avatar Sync.
//!
//! Best effort: every failure ends up in [`AvatarSyncOutcome::Failed`] instead of an error, so
//! callers can ignore the outcome or assert on it without depending on log output.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::contract::{AccountStore, HistoryProvider};
use crate::model::Platform;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AvatarSyncOutcome {
    /// Avatar and/or display name changed on the account.
    Updated,
    /// The provider reported the values already cached.
    Unchanged,
    /// The provider had no avatar for this platform.
    NoAvatar,
    /// No local account exists for this profile key and platform.
    NoAccount,
    Failed(String),
}

impl AvatarSyncOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, AvatarSyncOutcome::Updated)
    }
}

pub async fn sync_avatar(
    provider: &dyn HistoryProvider,
    accounts: &dyn AccountStore,
    platform: Platform,
    profile_key: &str,
) -> AvatarSyncOutcome {
    let profile = match provider.fetch_profile(profile_key).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(platform = %platform, error = %e, "[AVATAR] Profile fetch failed");
            return AvatarSyncOutcome::Failed(e.to_string());
        }
    };

    let entry = profile.display_names.into_iter().find(|d| {
        d.platform
            .as_deref()
            .and_then(|p| p.parse::<Platform>().ok())
            == Some(platform)
    });
    let Some(entry) = entry else {
        return AvatarSyncOutcome::NoAvatar;
    };
    let Some(avatar_url) = entry.user_image.filter(|u| !u.trim().is_empty()) else {
        return AvatarSyncOutcome::NoAvatar;
    };

    let mut account = match accounts.get_account(profile_key, platform).await {
        Ok(Some(account)) => account,
        Ok(None) => return AvatarSyncOutcome::NoAccount,
        Err(e) => {
            warn!(platform = %platform, error = %e, "[AVATAR] Account lookup failed");
            return AvatarSyncOutcome::Failed(e.to_string());
        }
    };

    let display_name = entry
        .display_name
        .or(entry.username)
        .or_else(|| account.display_name.clone());
    if account.avatar_url.as_deref() == Some(avatar_url.as_str())
        && account.display_name == display_name
    {
        return AvatarSyncOutcome::Unchanged;
    }

    account.avatar_url = Some(avatar_url);
    account.display_name = display_name;
    match accounts.upsert_account(account).await {
        Ok(()) => {
            info!(platform = %platform, "[AVATAR] Updated cached avatar");
            AvatarSyncOutcome::Updated
        }
        Err(e) => {
            warn!(platform = %platform, error = %e, "[AVATAR] Account update failed");
            AvatarSyncOutcome::Failed(e.to_string())
        }
    }
}

/// Handle to a spawned avatar sync.
pub struct AvatarSyncHandle(JoinHandle<AvatarSyncOutcome>);

impl AvatarSyncHandle {
    /// Wait for the task; a panicked or cancelled task is reported as `Failed`.
    pub async fn outcome(self) -> AvatarSyncOutcome {
        match self.0.await {
            Ok(outcome) => outcome,
            Err(e) => AvatarSyncOutcome::Failed(format!("avatar sync task failed: {e}")),
        }
    }
}

/// Run [`sync_avatar`] on its own task. Dropping the handle detaches it.
pub fn spawn_avatar_sync(
    provider: Arc<dyn HistoryProvider>,
    accounts: Arc<dyn AccountStore>,
    platform: Platform,
    profile_key: String,
) -> AvatarSyncHandle {
    AvatarSyncHandle(tokio::spawn(async move {
        sync_avatar(provider.as_ref(), accounts.as_ref(), platform, &profile_key).await
    }))
}
