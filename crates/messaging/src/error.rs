use domain::EventKind;
use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// No destination is configured for the event kind.
    #[error("No route configured for event kind {0}")]
    NoRoute(EventKind),

    /// The broker could not be reached or did not confirm in time.
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// The broker explicitly rejected the message.
    #[error("Message to {destination} was not acknowledged by the broker")]
    NotAcknowledged { destination: String },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
