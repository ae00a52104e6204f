//! Use case inputs and outputs.

use std::path::Path;

use chrono::{DateTime, Utc};
use common::{CastMemberId, CategoryId, GenreId, VideoId};
use domain::{
    AggregateRoot, ImageKind, MediaKind, MediaStatus, Rating, Video, VideoDetails,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input for creating a video.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVideo {
    pub details: VideoDetails,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub genres: Vec<GenreId>,
    #[serde(default)]
    pub cast_members: Vec<CastMemberId>,
}

impl CreateVideo {
    pub fn new(details: VideoDetails) -> Self {
        Self {
            details,
            categories: Vec::new(),
            genres: Vec::new(),
            cast_members: Vec::new(),
        }
    }
}

/// Input for updating a video.
///
/// Related ids left as `None` are kept; `Some` replaces the whole set.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateVideo {
    pub video_id: VideoId,
    pub details: VideoDetails,
    pub categories: Option<Vec<CategoryId>>,
    pub genres: Option<Vec<GenreId>>,
    pub cast_members: Option<Vec<CastMemberId>>,
}

impl UpdateVideo {
    pub fn new(video_id: VideoId, details: VideoDetails) -> Self {
        Self {
            video_id,
            details,
            categories: None,
            genres: None,
            cast_members: None,
        }
    }
}

/// The slot an uploaded file goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSlot {
    Media(MediaKind),
    Image(ImageKind),
}

impl UploadSlot {
    /// Returns the slot name used in storage object names.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSlot::Media(kind) => kind.as_str(),
            UploadSlot::Image(kind) => kind.as_str(),
        }
    }
}

impl From<MediaKind> for UploadSlot {
    fn from(kind: MediaKind) -> Self {
        UploadSlot::Media(kind)
    }
}

impl From<ImageKind> for UploadSlot {
    fn from(kind: ImageKind) -> Self {
        UploadSlot::Image(kind)
    }
}

/// A file to upload into a slot.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub slot: UploadSlot,
    /// Original file name; only its extension is kept.
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MediaUpload {
    /// Returns the storage name `{video_id}/{slot}/{upload_id}.{ext}`.
    ///
    /// Every upload gets its own object, so a new file never overwrites
    /// one that a stored video or an announced event still points to.
    pub fn storage_name(&self, video_id: VideoId, upload_id: Uuid) -> String {
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin");
        format!("{video_id}/{}/{upload_id}.{extension}", self.slot.as_str())
    }
}

/// Input for uploading files to a video.
#[derive(Debug, Clone)]
pub struct UploadMedias {
    pub video_id: VideoId,
    pub files: Vec<MediaUpload>,
}

/// Input for status reconciliation, as reported by the encoder.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMediaStatus {
    pub video_id: VideoId,
    /// One of `processing`, `completed` or `error`.
    pub status: String,
    #[serde(default)]
    pub media_kind: MediaKind,
    pub encoded_path: Option<String>,
    pub error_message: Option<String>,
}

impl UpdateMediaStatus {
    pub fn completed(video_id: VideoId, encoded_path: impl Into<String>) -> Self {
        Self {
            video_id,
            status: "completed".to_string(),
            media_kind: MediaKind::Media,
            encoded_path: Some(encoded_path.into()),
            error_message: None,
        }
    }

    pub fn processing(video_id: VideoId) -> Self {
        Self {
            video_id,
            status: "processing".to_string(),
            media_kind: MediaKind::Media,
            encoded_path: None,
            error_message: None,
        }
    }

    pub fn error(video_id: VideoId, error_message: impl Into<String>) -> Self {
        Self {
            video_id,
            status: "error".to_string(),
            media_kind: MediaKind::Media,
            encoded_path: None,
            error_message: Some(error_message.into()),
        }
    }

    /// Targets the trailer slot instead of the primary media.
    pub fn for_trailer(mut self) -> Self {
        self.media_kind = MediaKind::Trailer;
        self
    }
}

/// A time-based media slot as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaOutput {
    pub file_path: String,
    pub encoded_path: Option<String>,
    pub status: MediaStatus,
}

/// Read projection of a video.
#[derive(Debug, Clone, Serialize)]
pub struct VideoOutput {
    pub id: VideoId,
    pub title: String,
    pub description: String,
    pub year_launched: i32,
    pub duration: i32,
    pub opened: bool,
    pub published: bool,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
    pub media: Option<MediaOutput>,
    pub trailer: Option<MediaOutput>,
    pub thumb: Option<String>,
    pub banner: Option<String>,
    pub thumb_half: Option<String>,
    pub categories: Vec<CategoryId>,
    pub genres: Vec<GenreId>,
    pub cast_members: Vec<CastMemberId>,
}

impl From<&Video> for VideoOutput {
    fn from(video: &Video) -> Self {
        let media = |kind| {
            video.media(kind).map(|media| MediaOutput {
                file_path: media.file_path().to_string(),
                encoded_path: media.encoded_path().map(str::to_string),
                status: media.status(),
            })
        };
        let image = |kind| video.image(kind).map(|image| image.path().to_string());
        let details = video.details();

        Self {
            id: video.id(),
            title: details.title.clone(),
            description: details.description.clone(),
            year_launched: details.year_launched,
            duration: details.duration,
            opened: details.opened,
            published: details.published,
            rating: details.rating,
            created_at: video.created_at(),
            media: media(MediaKind::Media),
            trailer: media(MediaKind::Trailer),
            thumb: image(ImageKind::Thumb),
            banner: image(ImageKind::Banner),
            thumb_half: image(ImageKind::ThumbHalf),
            categories: video.categories().collect(),
            genres: video.genres().collect(),
            cast_members: video.cast_members().collect(),
        }
    }
}

/// A storage path that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of deleting a video.
///
/// The catalog record is gone whenever a report is returned; `failed`
/// lists storage objects left behind.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionReport {
    pub video_id: VideoId,
    pub cleaned: Vec<String>,
    pub failed: Vec<CleanupFailure>,
}

impl DeletionReport {
    /// Returns true if every storage object was removed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
