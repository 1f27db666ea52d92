use thiserror::Error;

/// Failures from the persistent key-value layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("storage migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures from the remote API collaborators.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream call timed out after {0}s")]
    Timeout(u64),

    #[error("{0} not found")]
    NotFound(String),

    #[error("malformed upstream payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
