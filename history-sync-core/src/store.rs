//! In-memory implementation of every store trait, for tests and embedding.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::contract::{holds_provider_post, AccountStore, BlobStore, PostStore, StoreError};
use crate::model::{Account, BlobRef, LocalPost, Platform};

#[derive(Default)]
pub struct MemoryStore {
    posts: Mutex<Vec<LocalPost>>,
    accounts: Mutex<Vec<Account>>,
    blobs: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

fn poisoned<T>(_: T) -> StoreError {
    "memory store lock poisoned".into()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<LocalPost>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Self::default()
        }
    }

    pub fn with_accounts(self, accounts: Vec<Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            ..self
        }
    }

    pub fn posts(&self) -> Vec<LocalPost> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or_default()
    }

    /// Content type and bytes of a stored blob.
    pub fn blob(&self, id: &str) -> Option<(String, Vec<u8>)> {
        self.blobs.lock().ok()?.get(id).cloned()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn list_posts(&self) -> Result<Vec<LocalPost>, StoreError> {
        Ok(self.posts.lock().map_err(poisoned)?.clone())
    }

    async fn append_post(&self, post: LocalPost) -> Result<(), StoreError> {
        self.posts.lock().map_err(poisoned)?.push(post);
        Ok(())
    }

    async fn append_post_if_absent(
        &self,
        platform: Platform,
        post: LocalPost,
    ) -> Result<bool, StoreError> {
        let mut posts = self.posts.lock().map_err(poisoned)?;
        let provider_id = post
            .variant(platform)
            .and_then(|v| v.provider_post_id.clone());
        if let Some(id) = provider_id {
            if holds_provider_post(&posts, platform, &id) {
                return Ok(false);
            }
        }
        posts.push(post);
        Ok(true)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(
        &self,
        profile_key: &str,
        platform: Platform,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .map_err(poisoned)?
            .iter()
            .find(|a| a.profile_key == profile_key && a.platform == platform)
            .cloned())
    }

    async fn upsert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().map_err(poisoned)?;
        match accounts
            .iter_mut()
            .find(|a| a.profile_key == account.profile_key && a.platform == account.platform)
        {
            Some(existing) => *existing = account,
            None => accounts.push(account),
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<BlobRef, StoreError> {
        let id = Uuid::new_v4().to_string();
        let size = bytes.len() as u64;
        self.blobs
            .lock()
            .map_err(poisoned)?
            .insert(id.clone(), (content_type.to_string(), bytes));
        Ok(BlobRef {
            id,
            content_type: content_type.to_string(),
            size,
        })
    }
}
