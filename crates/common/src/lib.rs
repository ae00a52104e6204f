//! Identifier types shared by every catalog crate.

mod types;

pub use types::{CastMemberId, CategoryId, GenreId, ParseIdError, VideoId};
