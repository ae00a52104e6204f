//! Domain layer for the video catalog.
//!
//! This crate provides the core domain abstractions including:
//! - AggregateRoot trait for entities that buffer domain events
//! - DomainEvent trait and the closed set of event kinds
//! - Video aggregate implementation with the media encoding state machine

pub mod aggregate;
pub mod validation;
pub mod video;

pub use aggregate::{AggregateRoot, DomainEvent, EventBuffer, EventKind};
pub use validation::{FieldViolation, ValidationErrors};
pub use video::{
    Image, ImageKind, Media, MediaKind, MediaStatus, Rating, Video, VideoDetails, VideoError,
    VideoEvent, VideoUploadedData,
};
