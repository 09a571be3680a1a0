use std::sync::Arc;

use history_sync_core::avatar::{spawn_avatar_sync, sync_avatar, AvatarSyncOutcome};
use history_sync_core::contract::{MockHistoryProvider, ProfilePayload, RawDisplayName};
use history_sync_core::error::FetchError;
use history_sync_core::model::{Account, Platform};
use history_sync_core::store::MemoryStore;

fn profile(platform: &str, image: Option<&str>) -> ProfilePayload {
    ProfilePayload {
        display_names: vec![RawDisplayName {
            platform: Some(platform.into()),
            display_name: Some("Acme Co".into()),
            user_image: image.map(str::to_string),
            username: Some("acme".into()),
            profile_url: None,
        }],
    }
}

fn provider_with(payload: ProfilePayload) -> MockHistoryProvider {
    let mut provider = MockHistoryProvider::new();
    provider
        .expect_fetch_profile()
        .returning(move |_| Ok(payload.clone()));
    provider
}

#[tokio::test]
async fn test_updates_account_avatar_and_name() {
    let provider = provider_with(profile("facebook", Some("https://img.test/a.png")));
    let store = MemoryStore::new().with_accounts(vec![Account::linked(Platform::Facebook, "PK")]);

    let outcome = sync_avatar(&provider, &store, Platform::Facebook, "PK").await;

    assert_eq!(outcome, AvatarSyncOutcome::Updated);
    let account = &store.accounts()[0];
    assert_eq!(account.avatar_url.as_deref(), Some("https://img.test/a.png"));
    assert_eq!(account.display_name.as_deref(), Some("Acme Co"));
}

#[tokio::test]
async fn test_unchanged_when_values_match() {
    let provider = provider_with(profile("facebook", Some("https://img.test/a.png")));
    let mut account = Account::linked(Platform::Facebook, "PK");
    account.avatar_url = Some("https://img.test/a.png".into());
    account.display_name = Some("Acme Co".into());
    let store = MemoryStore::new().with_accounts(vec![account]);

    let outcome = sync_avatar(&provider, &store, Platform::Facebook, "PK").await;

    assert_eq!(outcome, AvatarSyncOutcome::Unchanged);
}

#[tokio::test]
async fn test_no_avatar_and_no_account() {
    let blank_image = provider_with(profile("facebook", Some("  ")));
    let other_platform = provider_with(profile("instagram", Some("https://img.test/b.png")));
    let with_account =
        MemoryStore::new().with_accounts(vec![Account::linked(Platform::Facebook, "PK")]);

    assert_eq!(
        sync_avatar(&blank_image, &with_account, Platform::Facebook, "PK").await,
        AvatarSyncOutcome::NoAvatar
    );
    assert_eq!(
        sync_avatar(&other_platform, &with_account, Platform::Facebook, "PK").await,
        AvatarSyncOutcome::NoAvatar
    );

    let has_avatar = provider_with(profile("facebook", Some("https://img.test/a.png")));
    let empty = MemoryStore::new();
    assert_eq!(
        sync_avatar(&has_avatar, &empty, Platform::Facebook, "PK").await,
        AvatarSyncOutcome::NoAccount
    );
    assert!(empty.accounts().is_empty());
}

#[tokio::test]
async fn test_profile_failure_is_reported_not_raised() {
    let mut provider = MockHistoryProvider::new();
    provider
        .expect_fetch_profile()
        .returning(|_| Err(FetchError::Network("connection reset".into())));
    let store = Arc::new(
        MemoryStore::new().with_accounts(vec![Account::linked(Platform::Gmb, "PK")]),
    );

    let handle = spawn_avatar_sync(Arc::new(provider), store.clone(), Platform::Gmb, "PK".into());
    let outcome = handle.outcome().await;

    assert!(matches!(outcome, AvatarSyncOutcome::Failed(ref reason) if reason.contains("connection reset")));
    assert!(store.accounts()[0].avatar_url.is_none());
}
