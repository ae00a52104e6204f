//! Video aggregate implementation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{CastMemberId, CategoryId, GenreId, VideoId};
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateRoot, EventBuffer};
use crate::validation::ValidationErrors;

use super::{Image, ImageKind, Media, MediaKind, MediaStatus, VideoDetails, VideoError, VideoEvent};

/// Video aggregate root.
///
/// Owns its descriptive fields, up to five media slots and the ids of
/// related catalog entities. Operations that external systems care about
/// buffer a [`VideoEvent`]; status reconciliation does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    id: VideoId,

    details: VideoDetails,

    created_at: DateTime<Utc>,

    /// Number of accepted saves. Stores reject a write whose version is stale.
    #[serde(default)]
    version: u64,

    media: Option<Media>,
    trailer: Option<Media>,
    thumb: Option<Image>,
    banner: Option<Image>,
    thumb_half: Option<Image>,

    #[serde(default)]
    categories: BTreeSet<CategoryId>,
    #[serde(default)]
    genres: BTreeSet<GenreId>,
    #[serde(default)]
    cast_members: BTreeSet<CastMemberId>,

    /// Never stored: events only live until the unit of work dispatches them.
    #[serde(skip)]
    events: EventBuffer<VideoEvent>,
}

impl AggregateRoot for Video {
    type Id = VideoId;
    type Event = VideoEvent;

    fn aggregate_type() -> &'static str {
        "Video"
    }

    fn id(&self) -> VideoId {
        self.id
    }

    fn pending_events(&self) -> &[VideoEvent] {
        self.events.as_slice()
    }

    fn drain_events(&mut self) -> Vec<VideoEvent> {
        self.events.drain()
    }
}

// Query methods
impl Video {
    /// Returns the descriptive fields.
    pub fn details(&self) -> &VideoDetails {
        &self.details
    }

    pub fn title(&self) -> &str {
        &self.details.title
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns how many times the video has been saved; zero before the first save.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the time-based media in the given slot.
    pub fn media(&self, kind: MediaKind) -> Option<&Media> {
        match kind {
            MediaKind::Media => self.media.as_ref(),
            MediaKind::Trailer => self.trailer.as_ref(),
        }
    }

    /// Returns the image in the given slot.
    pub fn image(&self, kind: ImageKind) -> Option<&Image> {
        match kind {
            ImageKind::Thumb => self.thumb.as_ref(),
            ImageKind::Banner => self.banner.as_ref(),
            ImageKind::ThumbHalf => self.thumb_half.as_ref(),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.categories.iter().copied()
    }

    pub fn genres(&self) -> impl Iterator<Item = GenreId> + '_ {
        self.genres.iter().copied()
    }

    pub fn cast_members(&self) -> impl Iterator<Item = CastMemberId> + '_ {
        self.cast_members.iter().copied()
    }

    /// Returns every storage path referenced by the video.
    ///
    /// Includes encoded outputs, which live in the same object store as
    /// the raw uploads.
    pub fn storage_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for media in [&self.media, &self.trailer].into_iter().flatten() {
            paths.push(media.file_path().to_string());
            if let Some(encoded) = media.encoded_path() {
                paths.push(encoded.to_string());
            }
        }
        for image in [&self.thumb, &self.banner, &self.thumb_half]
            .into_iter()
            .flatten()
        {
            paths.push(image.path().to_string());
        }
        paths
    }
}

// Command methods
impl Video {
    /// Creates a new video after validating its descriptive fields.
    pub fn new(details: VideoDetails) -> Result<Self, VideoError> {
        details.validate()?;

        Ok(Self {
            id: VideoId::new(),
            details,
            created_at: Utc::now(),
            version: 0,
            media: None,
            trailer: None,
            thumb: None,
            banner: None,
            thumb_half: None,
            categories: BTreeSet::new(),
            genres: BTreeSet::new(),
            cast_members: BTreeSet::new(),
            events: EventBuffer::default(),
        })
    }

    /// Replaces the descriptive fields. Leaves the video untouched on failure.
    pub fn update(&mut self, details: VideoDetails) -> Result<(), VideoError> {
        details.validate()?;
        self.details = details;
        Ok(())
    }

    /// Attaches an uploaded file to a time-based slot and buffers a
    /// `VideoUploaded` event.
    ///
    /// The slot must be empty, `Completed` or `Error`. A file still waiting
    /// for or going through encoding cannot be replaced.
    pub fn attach_media(
        &mut self,
        kind: MediaKind,
        file_path: impl Into<String>,
    ) -> Result<(), VideoError> {
        let file_path = file_path.into();
        if file_path.trim().is_empty() {
            return Err(ValidationErrors::single("file_path", "should not be empty").into());
        }

        self.ensure_media_replaceable(kind)?;

        *self.media_slot_mut(kind) = Some(Media::pending(file_path.clone()));
        let id = self.id;
        self.events
            .record(VideoEvent::video_uploaded(id, kind, file_path));
        Ok(())
    }

    /// Fails if the slot holds a file still waiting for or going through encoding.
    pub fn ensure_media_replaceable(&self, kind: MediaKind) -> Result<(), VideoError> {
        match self.media(kind).map(Media::status) {
            Some(current) if !current.can_reupload() => Err(VideoError::InvalidStatus {
                kind,
                current: Some(current),
                action: "upload",
            }),
            _ => Ok(()),
        }
    }

    /// Attaches an uploaded image. Images are not encoded, so no event is raised.
    pub fn attach_image(
        &mut self,
        kind: ImageKind,
        path: impl Into<String>,
    ) -> Result<(), VideoError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(ValidationErrors::single("path", "should not be empty").into());
        }

        let image = Some(Image::new(path));
        match kind {
            ImageKind::Thumb => self.thumb = image,
            ImageKind::Banner => self.banner = image,
            ImageKind::ThumbHalf => self.thumb_half = image,
        }
        Ok(())
    }

    /// Records that the encoder accepted the job.
    pub fn mark_processing(&mut self, kind: MediaKind) -> Result<MediaStatus, VideoError> {
        let media = self.transition(kind, MediaStatus::Processing, "mark processing")?;
        media.set_status(MediaStatus::Processing);
        Ok(media.status())
    }

    /// Records a successful encode and its output path.
    pub fn mark_encoded(
        &mut self,
        kind: MediaKind,
        encoded_path: impl Into<String>,
    ) -> Result<MediaStatus, VideoError> {
        let encoded_path = encoded_path.into();
        if encoded_path.trim().is_empty() {
            return Err(ValidationErrors::single("encoded_path", "should not be empty").into());
        }

        let media = self.transition(kind, MediaStatus::Completed, "mark completed")?;
        media.complete(encoded_path);
        Ok(media.status())
    }

    /// Records a failed encode.
    pub fn mark_encoding_error(&mut self, kind: MediaKind) -> Result<MediaStatus, VideoError> {
        let media = self.transition(kind, MediaStatus::Error, "mark error")?;
        media.set_status(MediaStatus::Error);
        Ok(media.status())
    }

    /// Records that a store accepted this state. Only persistence calls this.
    pub fn mark_saved(&mut self) {
        self.version += 1;
    }

    pub fn add_category(&mut self, id: CategoryId) {
        self.categories.insert(id);
    }

    /// Returns false if the category was not referenced.
    pub fn remove_category(&mut self, id: CategoryId) -> bool {
        self.categories.remove(&id)
    }

    pub fn clear_categories(&mut self) {
        self.categories.clear();
    }

    pub fn add_genre(&mut self, id: GenreId) {
        self.genres.insert(id);
    }

    /// Returns false if the genre was not referenced.
    pub fn remove_genre(&mut self, id: GenreId) -> bool {
        self.genres.remove(&id)
    }

    pub fn clear_genres(&mut self) {
        self.genres.clear();
    }

    pub fn add_cast_member(&mut self, id: CastMemberId) {
        self.cast_members.insert(id);
    }

    /// Returns false if the cast member was not referenced.
    pub fn remove_cast_member(&mut self, id: CastMemberId) -> bool {
        self.cast_members.remove(&id)
    }

    pub fn clear_cast_members(&mut self) {
        self.cast_members.clear();
    }

    fn media_slot_mut(&mut self, kind: MediaKind) -> &mut Option<Media> {
        match kind {
            MediaKind::Media => &mut self.media,
            MediaKind::Trailer => &mut self.trailer,
        }
    }

    /// Returns the slot if it may move to `next`.
    fn transition(
        &mut self,
        kind: MediaKind,
        next: MediaStatus,
        action: &'static str,
    ) -> Result<&mut Media, VideoError> {
        let current = self.media(kind).map(Media::status);
        if !current.is_some_and(|status| status.can_transition_to(next)) {
            return Err(VideoError::InvalidStatus {
                kind,
                current,
                action,
            });
        }

        self.media_slot_mut(kind)
            .as_mut()
            .ok_or(VideoError::InvalidStatus {
                kind,
                current: None,
                action,
            })
    }
}
