//! Media slot values.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MediaStatus;

/// The time-based media slots, which go through encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// The primary video file.
    #[default]
    Media,

    /// The trailer.
    Trailer,
}

impl MediaKind {
    /// Returns the slot name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Media => "media",
            MediaKind::Trailer => "trailer",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "media" => Ok(MediaKind::Media),
            "trailer" => Ok(MediaKind::Trailer),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// The image-only slots. They hold a path and no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Thumb,
    Banner,
    ThumbHalf,
}

impl ImageKind {
    /// Returns the slot name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Thumb => "thumb",
            ImageKind::Banner => "banner",
            ImageKind::ThumbHalf => "thumb_half",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded time-based media file and its encoding progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Storage path of the raw upload.
    file_path: String,

    /// Storage path produced by the encoder, once known.
    encoded_path: Option<String>,

    /// Current encoding status.
    status: MediaStatus,
}

impl Media {
    pub(crate) fn pending(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            encoded_path: None,
            status: MediaStatus::Pending,
        }
    }

    /// Returns the raw upload path.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Returns the encoded path, if encoding completed.
    pub fn encoded_path(&self) -> Option<&str> {
        self.encoded_path.as_deref()
    }

    /// Returns the encoding status.
    pub fn status(&self) -> MediaStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: MediaStatus) {
        self.status = status;
    }

    pub(crate) fn complete(&mut self, encoded_path: String) {
        self.encoded_path = Some(encoded_path);
        self.status = MediaStatus::Completed;
    }
}

/// An uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    path: String,
}

impl Image {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the storage path.
    pub fn path(&self) -> &str {
        &self.path
    }
}
