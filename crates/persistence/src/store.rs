use async_trait::async_trait;
use common::VideoId;
use domain::{AggregateRoot, Video};

use crate::Result;

/// Every mutation collected by a persistence context, applied as one write.
///
/// Each entry carries the version it was loaded at. A store applies the
/// whole set only if every stored version still matches.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Videos to insert (version 0) or overwrite.
    pub upserts: Vec<Video>,

    /// Videos to delete.
    pub deletes: Vec<Deletion>,
}

/// A video to delete, guarded by the version it was loaded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deletion {
    pub id: VideoId,
    pub expected_version: u64,
}

impl Deletion {
    pub fn of(video: &Video) -> Self {
        Self {
            id: video.id(),
            expected_version: video.version(),
        }
    }
}

impl ChangeSet {
    /// Returns true if there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Core trait for video store implementations.
///
/// Stores only keep aggregate state. Pending domain events are not part
/// of it and are never written.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Loads a video by id.
    async fn find(&self, id: VideoId) -> Result<Option<Video>>;

    /// Applies every change atomically - either all succeed or none do.
    ///
    /// Fails with [`crate::PersistenceError::ConcurrencyConflict`] when any stored
    /// version differs from the one in `changes`. Stored versions are one
    /// past the submitted ones after a successful save.
    async fn save_changes(&self, changes: ChangeSet) -> Result<()>;
}
