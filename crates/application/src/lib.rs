//! Application layer for the video catalog.
//!
//! Use cases run inside a [`UnitOfWork`], which publishes the events
//! buffered by the videos it tracks and only then persists them. A failed
//! publish leaves the store untouched.

pub mod commands;
mod error;
mod publisher;
mod service;
pub mod storage;
mod unit_of_work;

pub use commands::{
    CleanupFailure, CreateVideo, DeletionReport, MediaOutput, MediaUpload, UpdateMediaStatus,
    UpdateVideo, UploadMedias, UploadSlot, VideoOutput,
};
pub use error::{ApplicationError, Result};
pub use publisher::{
    EventHandler, EventPublisher, EventPublisherBuilder, VideoUploadedHandler,
    video_event_publisher,
};
pub use service::VideoService;
pub use storage::{InMemoryStorage, LocalStorage, StorageError, StorageService};
pub use unit_of_work::UnitOfWork;
