//! JSON file store used by the CLI and the server.
//!
//! Layout under `data_dir`:
//! - `posts.json`: the post collection, in append order
//! - `accounts.json`: account records
//! - `blobs/<sha256>`: media bytes, addressed by content hash
//!
//! Writes go to a temp file in the same directory and are renamed over the target, so a crash
//! never leaves a half-written collection behind. File I/O runs on the blocking thread pool.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use history_sync_core::contract::{
    holds_provider_post, AccountStore, BlobStore, PostStore, StoreError,
};
use history_sync_core::model::{Account, BlobRef, LocalPost, Platform};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

const POSTS_FILE: &str = "posts.json";
const ACCOUNTS_FILE: &str = "accounts.json";
const BLOBS_DIR: &str = "blobs";

pub struct FileStore {
    inner: Arc<StoreFiles>,
}

struct StoreFiles {
    root: PathBuf,
    // Serializes read-modify-write cycles on the JSON files.
    lock: Mutex<()>,
}

fn poisoned<T>(_: T) -> StoreError {
    "file store lock poisoned".into()
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(BLOBS_DIR))?;
        tracing::info!(data_dir = ?root, "Opened file store");
        Ok(Self {
            inner: Arc::new(StoreFiles {
                root,
                lock: Mutex::new(()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn blob_path(&self, id: &str) -> PathBuf {
        self.inner.blob_path(id)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&StoreFiles) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let files = self.inner.clone();
        tokio::task::spawn_blocking(move || op(&files))
            .await
            .map_err(|e| StoreError::from(format!("file store task failed: {e}")))?
    }
}

impl StoreFiles {
    fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join(BLOBS_DIR).join(id)
    }

    fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        let path = self.root.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            tracing::error!(error = %e, path = ?path, "Corrupt store file");
            e.into()
        })
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(self.root.join(name)).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for FileStore {
    async fn list_posts(&self) -> Result<Vec<LocalPost>, StoreError> {
        self.blocking(|files| {
            let _guard = files.lock.lock().map_err(poisoned)?;
            files.read_json(POSTS_FILE)
        })
        .await
    }

    async fn append_post(&self, post: LocalPost) -> Result<(), StoreError> {
        self.blocking(move |files| {
            let _guard = files.lock.lock().map_err(poisoned)?;
            let mut posts: Vec<LocalPost> = files.read_json(POSTS_FILE)?;
            posts.push(post);
            files.write_json(POSTS_FILE, &posts)
        })
        .await
    }

    async fn append_post_if_absent(
        &self,
        platform: Platform,
        post: LocalPost,
    ) -> Result<bool, StoreError> {
        self.blocking(move |files| {
            let _guard = files.lock.lock().map_err(poisoned)?;
            let mut posts: Vec<LocalPost> = files.read_json(POSTS_FILE)?;
            let provider_id = post
                .variant(platform)
                .and_then(|v| v.provider_post_id.clone());
            if let Some(id) = provider_id {
                if holds_provider_post(&posts, platform, &id) {
                    return Ok(false);
                }
            }
            posts.push(post);
            files.write_json(POSTS_FILE, &posts)?;
            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl AccountStore for FileStore {
    async fn get_account(
        &self,
        profile_key: &str,
        platform: Platform,
    ) -> Result<Option<Account>, StoreError> {
        let profile_key = profile_key.to_string();
        self.blocking(move |files| {
            let _guard = files.lock.lock().map_err(poisoned)?;
            let accounts: Vec<Account> = files.read_json(ACCOUNTS_FILE)?;
            Ok(accounts
                .into_iter()
                .find(|a| a.profile_key == profile_key && a.platform == platform))
        })
        .await
    }

    async fn upsert_account(&self, account: Account) -> Result<(), StoreError> {
        self.blocking(move |files| {
            let _guard = files.lock.lock().map_err(poisoned)?;
            let mut accounts: Vec<Account> = files.read_json(ACCOUNTS_FILE)?;
            match accounts
                .iter_mut()
                .find(|a| a.profile_key == account.profile_key && a.platform == account.platform)
            {
                Some(existing) => *existing = account,
                None => accounts.push(account),
            }
            files.write_json(ACCOUNTS_FILE, &accounts)
        })
        .await
    }
}

#[async_trait]
impl BlobStore for FileStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<BlobRef, StoreError> {
        let content_type = content_type.to_string();
        self.blocking(move |files| {
            let id = format!("{:x}", Sha256::digest(&bytes));
            let path = files.blob_path(&id);
            let size = bytes.len() as u64;
            if !path.exists() {
                let mut tmp = NamedTempFile::new_in(files.root.join(BLOBS_DIR))?;
                tmp.write_all(&bytes)?;
                tmp.persist(&path).map_err(|e| e.error)?;
                tracing::debug!(blob_id = %id, size, "Stored blob");
            }
            Ok(BlobRef {
                id,
                content_type,
                size,
            })
        })
        .await
    }
}
