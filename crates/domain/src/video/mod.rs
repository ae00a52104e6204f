//! Video aggregate and related types.

mod aggregate;
mod events;
mod media;
mod state;
mod value_objects;

pub use aggregate::Video;
pub use events::{VideoEvent, VideoUploadedData};
pub use media::{Image, ImageKind, Media, MediaKind};
pub use state::MediaStatus;
pub use value_objects::{DESCRIPTION_MAX_CHARS, Rating, TITLE_MAX_CHARS, VideoDetails};

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors that can occur during video operations.
#[derive(Debug, Error)]
pub enum VideoError {
    /// One or more field constraints were violated.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// The media slot is not in a state that allows the action.
    #[error(
        "Invalid status: cannot {action} {kind} from {} state",
        .current.map_or("empty", |status| status.as_str())
    )]
    InvalidStatus {
        kind: MediaKind,
        current: Option<MediaStatus>,
        action: &'static str,
    },
}
