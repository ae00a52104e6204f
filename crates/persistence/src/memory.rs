use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::VideoId;
use domain::{AggregateRoot, Video};

use crate::{
    PersistenceError, Result,
    store::{ChangeSet, Deletion, VideoStore},
};

#[derive(Debug)]
struct StoredVideo {
    version: u64,
    document: serde_json::Value,
}

#[derive(Debug, Default)]
struct InMemoryState {
    documents: HashMap<VideoId, StoredVideo>,
    save_count: usize,
    fail_on_save: bool,
}

/// In-memory video store implementation for testing.
///
/// Videos are kept in their serialized form, so a loaded video never
/// shares state with the instance that was saved.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVideoStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryVideoStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject every save.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.write().fail_on_save = fail;
    }

    /// Returns the number of successful saves.
    pub fn save_count(&self) -> usize {
        self.read().save_count
    }

    /// Returns the number of stored videos.
    pub fn video_count(&self) -> usize {
        self.read().documents.len()
    }

    /// Returns true if a video with the given id is stored.
    pub fn contains(&self, id: VideoId) -> bool {
        self.read().documents.contains_key(&id)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn find(&self, id: VideoId) -> Result<Option<Video>> {
        let document = self
            .read()
            .documents
            .get(&id)
            .map(|stored| stored.document.clone());
        document
            .map(serde_json::from_value)
            .transpose()
            .map_err(PersistenceError::from)
    }

    async fn save_changes(&self, changes: ChangeSet) -> Result<()> {
        // Serialize everything first so a bad document leaves the store untouched
        let upserts = changes
            .upserts
            .iter()
            .map(|video| {
                let mut saved = video.clone();
                saved.mark_saved();
                let stored = StoredVideo {
                    version: saved.version(),
                    document: serde_json::to_value(&saved)?,
                };
                Ok((video.id(), video.version(), stored))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.write();
        if state.fail_on_save {
            return Err(PersistenceError::Unavailable(
                "in-memory store configured to fail".to_string(),
            ));
        }

        let checks = upserts
            .iter()
            .map(|(id, version, _)| (*id, *version))
            .chain(changes.deletes.iter().map(|d| (d.id, d.expected_version)));
        for (video_id, expected) in checks {
            let actual = state.documents.get(&video_id).map_or(0, |s| s.version);
            if actual != expected {
                return Err(PersistenceError::ConcurrencyConflict {
                    video_id,
                    expected,
                    actual,
                });
            }
        }

        for (id, _, stored) in upserts {
            state.documents.insert(id, stored);
        }
        for deletion in &changes.deletes {
            state.documents.remove(&deletion.id);
        }
        state.save_count += 1;
        Ok(())
    }
}
