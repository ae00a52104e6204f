//! Value objects for the video domain.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationErrors, check_required_text};

/// Maximum title length, in characters.
pub const TITLE_MAX_CHARS: usize = 255;

/// Maximum description length, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 4000;

/// Content rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Rating {
    #[serde(rename = "ER")]
    Er,
    #[default]
    #[serde(rename = "L")]
    L,
    #[serde(rename = "10")]
    Age10,
    #[serde(rename = "12")]
    Age12,
    #[serde(rename = "14")]
    Age14,
    #[serde(rename = "16")]
    Age16,
    #[serde(rename = "18")]
    Age18,
}

impl Rating {
    /// Returns the rating label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Er => "ER",
            Rating::L => "L",
            Rating::Age10 => "10",
            Rating::Age12 => "12",
            Rating::Age14 => "14",
            Rating::Age16 => "16",
            Rating::Age18 => "18",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ER" => Ok(Rating::Er),
            "L" => Ok(Rating::L),
            "10" => Ok(Rating::Age10),
            "12" => Ok(Rating::Age12),
            "14" => Ok(Rating::Age14),
            "16" => Ok(Rating::Age16),
            "18" => Ok(Rating::Age18),
            other => Err(format!("unknown rating: {other}")),
        }
    }
}

/// The descriptive fields of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    pub description: String,
    pub year_launched: i32,
    /// Duration in minutes.
    pub duration: i32,
    pub opened: bool,
    pub published: bool,
    pub rating: Rating,
}

impl VideoDetails {
    /// Checks every field constraint and reports all violations together.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "title", &self.title, TITLE_MAX_CHARS);
        check_required_text(
            &mut errors,
            "description",
            &self.description,
            DESCRIPTION_MAX_CHARS,
        );
        if self.year_launched <= 0 {
            errors.add("year_launched", "should be a positive year");
        }
        if self.duration <= 0 {
            errors.add("duration", "should be greater than 0");
        }
        errors.into_result()
    }
}
