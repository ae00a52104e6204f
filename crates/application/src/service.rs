//! Video use cases.

use std::sync::Arc;

use common::VideoId;
use domain::{Video, VideoEvent};
use persistence::VideoStore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::commands::{
    CleanupFailure, CreateVideo, DeletionReport, UpdateMediaStatus, UpdateVideo, UploadMedias,
    UploadSlot, VideoOutput,
};
use crate::storage::{StorageError, StorageService};
use crate::{ApplicationError, EventPublisher, Result, UnitOfWork};

/// A status the encoder can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportedStatus {
    Processing,
    Completed,
    Error,
}

impl ReportedStatus {
    fn parse(status: &str) -> Result<Self> {
        match status {
            "processing" => Ok(ReportedStatus::Processing),
            "completed" => Ok(ReportedStatus::Completed),
            "error" => Ok(ReportedStatus::Error),
            other => Err(ApplicationError::validation(
                "status",
                format!("unknown status {other:?}, expected processing, completed or error"),
            )),
        }
    }
}

/// Application service for video operations.
///
/// Every operation runs in its own [`UnitOfWork`] and observes the
/// cancellation token it is given.
pub struct VideoService<S, T>
where
    S: VideoStore + Clone,
    T: StorageService,
{
    store: S,
    storage: T,
    publisher: Arc<EventPublisher<VideoEvent>>,
}

impl<S, T> VideoService<S, T>
where
    S: VideoStore + Clone,
    T: StorageService,
{
    /// Creates a new video service.
    pub fn new(store: S, storage: T, publisher: Arc<EventPublisher<VideoEvent>>) -> Self {
        Self {
            store,
            storage,
            publisher,
        }
    }

    fn unit_of_work(&self, cancel: &CancellationToken) -> UnitOfWork<S> {
        UnitOfWork::new(self.store.clone(), Arc::clone(&self.publisher), cancel.clone())
    }

    /// Creates a video.
    #[tracing::instrument(skip(self, input, cancel))]
    pub async fn create_video(
        &self,
        input: CreateVideo,
        cancel: &CancellationToken,
    ) -> Result<VideoOutput> {
        let mut video = Video::new(input.details)?;
        for id in input.categories {
            video.add_category(id);
        }
        for id in input.genres {
            video.add_genre(id);
        }
        for id in input.cast_members {
            video.add_cast_member(id);
        }

        let mut uow = self.unit_of_work(cancel);
        let output = VideoOutput::from(&*uow.videos().add(video));
        uow.commit().await?;

        tracing::info!(video_id = %output.id, "video created");
        Ok(output)
    }

    /// Updates a video's descriptive fields and, optionally, its related ids.
    #[tracing::instrument(skip(self, input, cancel), fields(video_id = %input.video_id))]
    pub async fn update_video(
        &self,
        input: UpdateVideo,
        cancel: &CancellationToken,
    ) -> Result<VideoOutput> {
        let mut uow = self.unit_of_work(cancel);
        let video = uow.videos().load(input.video_id).await?;

        video.update(input.details)?;
        if let Some(categories) = input.categories {
            video.clear_categories();
            categories.into_iter().for_each(|id| video.add_category(id));
        }
        if let Some(genres) = input.genres {
            video.clear_genres();
            genres.into_iter().for_each(|id| video.add_genre(id));
        }
        if let Some(cast_members) = input.cast_members {
            video.clear_cast_members();
            cast_members
                .into_iter()
                .for_each(|id| video.add_cast_member(id));
        }

        let output = VideoOutput::from(&*video);
        uow.commit().await?;
        Ok(output)
    }

    /// Uploads files and attaches them to their slots.
    ///
    /// Time-based media raise a `video_uploaded` event, published on commit.
    /// Slots that cannot take a new file yet are rejected before anything
    /// is uploaded. Each upload goes to a fresh object, so the files the
    /// video referenced before stay intact until the new state is
    /// committed; they are removed afterwards, best-effort.
    ///
    /// If anything fails after the first upload, the objects uploaded by
    /// this call are deleted again, except those already announced to the
    /// encoder.
    #[tracing::instrument(skip(self, input, cancel), fields(video_id = %input.video_id, files = input.files.len()))]
    pub async fn upload_medias(
        &self,
        input: UploadMedias,
        cancel: &CancellationToken,
    ) -> Result<VideoOutput> {
        let UploadMedias { video_id, files } = input;
        let mut uow = self.unit_of_work(cancel);
        let video = uow.videos().load(video_id).await?;
        for file in &files {
            if let UploadSlot::Media(kind) = file.slot {
                video.ensure_media_replaceable(kind)?;
            }
        }
        let previous = video.storage_paths();

        let mut uploaded = Vec::with_capacity(files.len());
        let result = async {
            for file in files {
                let name = file.storage_name(video_id, Uuid::new_v4());
                let path = self
                    .upload(&name, file.data, &file.content_type, cancel)
                    .await?;
                uploaded.push(path.clone());

                let video = uow.videos().load(video_id).await?;
                match file.slot {
                    UploadSlot::Media(kind) => video.attach_media(kind, path)?,
                    UploadSlot::Image(kind) => video.attach_image(kind, path)?,
                }
            }

            let video = uow.videos().load(video_id).await?;
            let output = VideoOutput::from(&*video);
            let current = video.storage_paths();
            uow.commit().await?;
            Ok::<_, ApplicationError>((output, current))
        }
        .await;

        match result {
            Ok((output, current)) => {
                let superseded = previous
                    .into_iter()
                    .filter(|path| !current.contains(path))
                    .collect();
                self.remove_objects(superseded, cancel).await;
                Ok(output)
            }
            Err(err) => {
                uow.rollback();
                let orphans: Vec<&String> = uploaded
                    .iter()
                    .filter(|path| {
                        !uow.dispatched()
                            .iter()
                            .any(|event| event.file_path() == path.as_str())
                    })
                    .collect();
                if orphans.len() < uploaded.len() {
                    tracing::warn!(
                        kept = uploaded.len() - orphans.len(),
                        "keeping uploads already announced to the encoder"
                    );
                }
                self.compensate_uploads(orphans).await;
                Err(err)
            }
        }
    }

    /// Applies an encoder report to a media slot.
    ///
    /// Unknown statuses fail with a validation error before the video is
    /// touched. No event is raised on this path.
    #[tracing::instrument(
        skip(self, input, cancel),
        fields(video_id = %input.video_id, media_kind = %input.media_kind, status = %input.status)
    )]
    pub async fn update_media_status(
        &self,
        input: UpdateMediaStatus,
        cancel: &CancellationToken,
    ) -> Result<VideoOutput> {
        let status = ReportedStatus::parse(&input.status)?;
        let kind = input.media_kind;

        let mut uow = self.unit_of_work(cancel);
        let video = uow.videos().load(input.video_id).await?;

        match status {
            ReportedStatus::Processing => video.mark_processing(kind)?,
            ReportedStatus::Completed => {
                let encoded_path = input.encoded_path.ok_or_else(|| {
                    ApplicationError::validation("encoded_path", "is required when completed")
                })?;
                video.mark_encoded(kind, encoded_path)?
            }
            ReportedStatus::Error => {
                tracing::error!(
                    video_id = %input.video_id,
                    media_kind = %kind,
                    error = input.error_message.as_deref().unwrap_or("unspecified"),
                    "encoder reported failure"
                );
                video.mark_encoding_error(kind)?
            }
        };

        let output = VideoOutput::from(&*video);
        uow.commit().await?;
        Ok(output)
    }

    /// Deletes a video, then removes its storage objects.
    ///
    /// Storage cleanup is advisory: failures are logged and reported but the
    /// deletion itself stays committed.
    #[tracing::instrument(skip(self, cancel), fields(video_id = %video_id))]
    pub async fn delete_video(
        &self,
        video_id: VideoId,
        cancel: &CancellationToken,
    ) -> Result<DeletionReport> {
        let mut uow = self.unit_of_work(cancel);
        let paths = uow.videos().load(video_id).await?.storage_paths();
        uow.videos().remove(video_id)?;
        uow.commit().await?;

        let (cleaned, failed) = self.remove_objects(paths, cancel).await;
        let report = DeletionReport {
            video_id,
            cleaned,
            failed,
        };

        tracing::info!(
            cleaned = report.cleaned.len(),
            failed = report.failed.len(),
            "video deleted"
        );
        Ok(report)
    }

    /// Returns a video.
    pub async fn get_video(&self, video_id: VideoId) -> Result<VideoOutput> {
        let video = self
            .store
            .find(video_id)
            .await?
            .ok_or(ApplicationError::NotFound(video_id))?;
        Ok(VideoOutput::from(&video))
    }

    async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, StorageError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::Cancelled),
            result = self.storage.upload(name, data, content_type) => result,
        }
    }

    async fn delete(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), StorageError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::Cancelled),
            result = self.storage.delete(path) => result,
        }
    }

    /// Deletes objects no stored video refers to any more. Failures are
    /// counted and logged, never returned.
    async fn remove_objects(
        &self,
        paths: Vec<String>,
        cancel: &CancellationToken,
    ) -> (Vec<String>, Vec<CleanupFailure>) {
        let mut cleaned = Vec::new();
        let mut failed = Vec::new();
        for path in paths {
            match self.delete(&path, cancel).await {
                Ok(()) => cleaned.push(path),
                Err(err) => {
                    metrics::counter!("storage_cleanup_failures_total").increment(1);
                    tracing::warn!(%path, error = %err, "storage cleanup failed");
                    failed.push(CleanupFailure {
                        path,
                        error: err.to_string(),
                    });
                }
            }
        }
        (cleaned, failed)
    }

    async fn compensate_uploads(&self, paths: Vec<&String>) {
        for path in paths {
            // Not cancellable: the caller has already given up on this operation.
            if let Err(err) = self.storage.delete(path).await {
                metrics::counter!("storage_cleanup_failures_total").increment(1);
                tracing::warn!(%path, error = %err, "failed to remove orphaned upload");
            }
        }
    }
}
