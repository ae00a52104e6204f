//! Change tracking for one unit of work.

use common::VideoId;
use domain::{AggregateRoot, Video};
use tokio_util::sync::CancellationToken;

use crate::{
    PersistenceError, Result,
    store::{ChangeSet, Deletion, VideoStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Added,
    Loaded,
    Deleted,
}

#[derive(Debug)]
struct Entry {
    video: Video,
    state: EntryState,
}

/// Tracks the videos touched by one operation and writes them back in a
/// single call to [`VideoStore::save_changes`].
///
/// A context is created per operation and discarded after it commits or
/// rolls back. Entries keep the order in which they were first tracked.
pub struct PersistenceContext<S> {
    store: S,
    entries: Vec<Entry>,
    cancel: CancellationToken,
}

impl<S: VideoStore> PersistenceContext<S> {
    /// Creates an empty context whose I/O stops when `cancel` fires.
    pub fn new(store: S, cancel: CancellationToken) -> Self {
        Self {
            store,
            entries: Vec::new(),
            cancel,
        }
    }

    /// Starts tracking a new video.
    ///
    /// Tracking a video that is already tracked replaces the tracked copy.
    pub fn add(&mut self, video: Video) -> &mut Video {
        let index = match self.position(video.id()) {
            Some(index) => {
                self.entries[index].video = video;
                self.entries[index].state = EntryState::Added;
                index
            }
            None => {
                self.entries.push(Entry {
                    video,
                    state: EntryState::Added,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].video
    }

    /// Returns the tracked video, loading it from the store on first access.
    #[tracing::instrument(skip(self), fields(video_id = %id))]
    pub async fn load(&mut self, id: VideoId) -> Result<&mut Video> {
        let index = match self.position(id) {
            Some(index) => index,
            None => {
                let found = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(PersistenceError::Cancelled),
                    found = self.store.find(id) => found?,
                };
                let video = found.ok_or(PersistenceError::NotFound(id))?;
                self.entries.push(Entry {
                    video,
                    state: EntryState::Loaded,
                });
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[index];
        if entry.state == EntryState::Deleted {
            return Err(PersistenceError::NotFound(id));
        }
        Ok(&mut entry.video)
    }

    /// Marks a tracked video for deletion.
    pub fn remove(&mut self, id: VideoId) -> Result<()> {
        let index = self.position(id).ok_or(PersistenceError::NotFound(id))?;
        let entry = &mut self.entries[index];
        if entry.state == EntryState::Added {
            // Never stored, so there is nothing to delete.
            self.entries.remove(index);
        } else {
            entry.state = EntryState::Deleted;
        }
        Ok(())
    }

    /// Returns every tracked video, including those marked for deletion.
    pub fn tracked(&self) -> impl Iterator<Item = &Video> {
        self.entries.iter().map(|entry| &entry.video)
    }

    /// Mutable counterpart of [`PersistenceContext::tracked`].
    pub fn tracked_mut(&mut self) -> impl Iterator<Item = &mut Video> {
        self.entries.iter_mut().map(|entry| &mut entry.video)
    }

    /// Returns the tracked videos whose event buffer is not empty.
    pub fn with_pending_events(&self) -> impl Iterator<Item = &Video> {
        self.tracked().filter(|video| video.has_pending_events())
    }

    /// Returns true if anything is tracked.
    pub fn has_changes(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Writes every tracked mutation to the store in one call.
    ///
    /// On success, deleted entries are forgotten and the rest are
    /// considered loaded at their new version. On failure, tracking is
    /// left untouched. A video changed by someone else since it was loaded
    /// fails the whole save with [`PersistenceError::ConcurrencyConflict`].
    pub async fn save_changes(&mut self) -> Result<()> {
        let mut changes = ChangeSet::default();
        for entry in &self.entries {
            match entry.state {
                EntryState::Added | EntryState::Loaded => changes.upserts.push(entry.video.clone()),
                EntryState::Deleted => changes.deletes.push(Deletion::of(&entry.video)),
            }
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PersistenceError::Cancelled),
            saved = self.store.save_changes(changes) => saved?,
        }

        self.entries.retain(|entry| entry.state != EntryState::Deleted);
        for entry in &mut self.entries {
            entry.state = EntryState::Loaded;
            entry.video.mark_saved();
        }
        tracing::debug!(tracked = self.entries.len(), "changes saved");
        Ok(())
    }

    /// Discards every uncommitted mutation.
    pub fn rollback(&mut self) {
        self.entries.clear();
    }

    fn position(&self, id: VideoId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.video.id() == id)
    }
}
