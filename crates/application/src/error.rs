//! Application error types.

use common::VideoId;
use domain::{EventKind, ValidationErrors, VideoError};
use messaging::MessagingError;
use persistence::PersistenceError;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by use cases and the unit of work.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Input violated one or more constraints.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The referenced video does not exist.
    #[error("Video not found: {0}")]
    NotFound(VideoId),

    /// Another operation saved the video after it was loaded here.
    #[error("Video {0} was modified concurrently")]
    Conflict(VideoId),

    /// A media status transition was not permitted.
    #[error("{0}")]
    InvalidStatus(VideoError),

    /// A notification could not be confirmed by the broker.
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(MessagingError),

    /// Object storage failed.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    /// The persistence layer failed.
    #[error("Persistence error: {0}")]
    Persistence(PersistenceError),

    /// An event was raised for a kind with no handler or route.
    #[error("No handler registered for event kind {0}")]
    UnhandledEvent(EventKind),

    /// Handlers are missing for some kinds at startup.
    #[error("Missing handlers for event kinds: {0:?}")]
    MissingHandlers(Vec<EventKind>),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ApplicationError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApplicationError::BrokerUnavailable(_)
                | ApplicationError::Conflict(_)
                | ApplicationError::Storage(_)
                | ApplicationError::Persistence(_)
                | ApplicationError::Cancelled
        )
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApplicationError::Validation(ValidationErrors::single(field, message))
    }
}

impl From<VideoError> for ApplicationError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::Validation(errors) => ApplicationError::Validation(errors),
            err @ VideoError::InvalidStatus { .. } => ApplicationError::InvalidStatus(err),
        }
    }
}

impl From<PersistenceError> for ApplicationError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(id) => ApplicationError::NotFound(id),
            PersistenceError::Cancelled => ApplicationError::Cancelled,
            PersistenceError::ConcurrencyConflict { video_id, .. } => {
                ApplicationError::Conflict(video_id)
            }
            err => ApplicationError::Persistence(err),
        }
    }
}

impl From<MessagingError> for ApplicationError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::NoRoute(kind) => ApplicationError::UnhandledEvent(kind),
            MessagingError::Cancelled => ApplicationError::Cancelled,
            err => ApplicationError::BrokerUnavailable(err),
        }
    }
}

/// Convenience type alias for application results.
pub type Result<T> = std::result::Result<T, ApplicationError>;
