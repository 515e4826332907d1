// Error taxonomy for a run: fetch failures, store failures, rejected records.

use thiserror::Error;

/// Errors from the GitHub traffic API. Any of these aborts the run before the store is touched.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP client could not be built (TLS or proxy misconfiguration)
    #[error("failed to build HTTP client: {0}")]
    Init(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed for {0}")]
    AuthFailed(String),

    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} for {entity}")]
    Status { status: u16, entity: String },

    /// Body was not JSON, or had no `views` array
    #[error("malformed traffic response: {0}")]
    Malformed(String),
}

/// Fatal errors for one archive run. Nothing is committed when one of these is returned.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("store setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A single traffic entry that could not be reconciled. Reported, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record {index}: {reason}")]
pub struct RecordError {
    /// Position of the entry in the fetched sequence.
    pub index: usize,
    pub reason: String,
}

impl RecordError {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}
