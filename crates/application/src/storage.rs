//! Object storage port and adapters.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object name is not a safe relative path.
    #[error("Invalid object name: {0}")]
    InvalidName(String),

    /// An I/O error occurred.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The storage backend refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Trait for object storage.
///
/// Both operations are idempotent: uploading the same name again
/// overwrites it, and deleting an absent path succeeds.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores `data` under `name` and returns the path to reference it by.
    async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Deletes the object at `path`.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Default)]
struct InMemoryStorageState {
    objects: HashMap<String, StoredObject>,
    fail_on_upload: bool,
    fail_on_delete: bool,
}

/// In-memory storage for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<RwLock<InMemoryStorageState>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the storage to fail every upload.
    pub fn set_fail_on_upload(&self, fail: bool) {
        self.write().fail_on_upload = fail;
    }

    /// Configures the storage to fail every delete.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.write().fail_on_delete = fail;
    }

    /// Returns true if an object exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.read().objects.contains_key(path)
    }

    /// Returns the content type recorded for `path`.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.read()
            .objects
            .get(path)
            .map(|object| object.content_type.clone())
    }

    /// Returns the number of stored objects.
    pub fn object_count(&self) -> usize {
        self.read().objects.len()
    }

    /// Stores an object directly, bypassing failure flags.
    pub fn put(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.write().objects.insert(
            path.to_string(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Returns the bytes stored at `path`.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.read().objects.get(path).map(|object| object.data.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryStorageState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryStorageState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageService for InMemoryStorage {
    async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let mut state = self.write();
        if state.fail_on_upload {
            return Err(StorageError::Unavailable("upload rejected".to_string()));
        }
        state.objects.insert(
            name.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(name.to_string())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let mut state = self.write();
        if state.fail_on_delete {
            return Err(StorageError::Unavailable(format!("delete of {path} rejected")));
        }
        state.objects.remove(path);
        Ok(())
    }
}

/// Storage on the local filesystem, rooted at a directory.
///
/// Returned paths are relative to the root.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(name);
        let is_safe = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_safe {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let target = self.resolve(name)?;
        let io_error = |source| StorageError::Io {
            path: name.to_string(),
            source,
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&target, data).await.map_err(io_error)?;
        Ok(name.to_string())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}
