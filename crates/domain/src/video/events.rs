//! Video domain events.

use chrono::{DateTime, Utc};
use common::VideoId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{DomainEvent, EventKind};

use super::MediaKind;

/// Events that can occur on a video aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoEvent {
    /// A time-based media file was attached and needs encoding.
    VideoUploaded(VideoUploadedData),
}

impl VideoEvent {
    /// Creates a VideoUploaded event.
    pub fn video_uploaded(
        resource_id: VideoId,
        media_kind: MediaKind,
        file_path: impl Into<String>,
    ) -> Self {
        VideoEvent::VideoUploaded(VideoUploadedData {
            resource_id,
            file_path: file_path.into(),
            media_kind,
            occurred_at: Utc::now(),
        })
    }

    /// Returns the storage path the event announces.
    pub fn file_path(&self) -> &str {
        match self {
            VideoEvent::VideoUploaded(data) => &data.file_path,
        }
    }
}

impl DomainEvent for VideoEvent {
    fn kind(&self) -> EventKind {
        match self {
            VideoEvent::VideoUploaded(_) => EventKind::VideoUploaded,
        }
    }

    fn resource_id(&self) -> Uuid {
        match self {
            VideoEvent::VideoUploaded(data) => data.resource_id.as_uuid(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VideoEvent::VideoUploaded(data) => data.occurred_at,
        }
    }
}

/// Data for VideoUploaded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoUploadedData {
    /// The video the file belongs to.
    pub resource_id: VideoId,

    /// Storage path of the raw upload.
    pub file_path: String,

    /// Which slot the file was attached to.
    pub media_kind: MediaKind,

    /// When the upload was recorded.
    pub occurred_at: DateTime<Utc>,
}
