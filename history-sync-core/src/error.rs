//! Error types for the reconciliation pipeline.

use thiserror::Error;

/// Boxed error returned by store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to obtain remote history or profile data.
///
/// Always distinct from an empty result: a provider that answers with zero posts yields
/// `Ok(vec![])`, never one of these.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response from the provider.
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Connection failed, timed out, or the body could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// Body was not the expected JSON shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Filter values rejected before any request was made.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure to materialize a single media URL.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media download returned HTTP {status}")]
    Status { status: u16 },

    #[error("media download failed: {0}")]
    Network(String),

    #[error("unsupported media content type '{0}'")]
    UnsupportedContent(String),

    #[error("media body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("failed to store media blob: {0}")]
    Store(String),
}

impl MediaError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MediaError::Status { status } => *status >= 500 || *status == 429,
            MediaError::Network(_) => true,
            MediaError::UnsupportedContent(_)
            | MediaError::TooLarge { .. }
            | MediaError::Store(_) => false,
        }
    }
}

/// Failure that aborts a synchronisation run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("post store failure: {0}")]
    Store(StoreError),
}
