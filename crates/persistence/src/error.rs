use common::VideoId;
use thiserror::Error;

/// Errors that can occur when loading or saving videos.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The video does not exist (or was deleted in this context).
    #[error("Video not found: {0}")]
    NotFound(VideoId),

    /// The stored video changed since it was loaded.
    #[error(
        "Concurrency conflict for video {video_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        video_id: VideoId,
        expected: u64,
        /// Zero when no row exists.
        actual: u64,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
