//! Persistence layer for the video catalog.
//!
//! Provides the [`VideoStore`] port with in-memory and PostgreSQL
//! implementations, and the [`PersistenceContext`] that tracks the
//! videos touched by one unit of work.

mod context;
mod error;
mod memory;
mod postgres;
pub mod store;

pub use common::VideoId;
pub use context::PersistenceContext;
pub use error::{PersistenceError, Result};
pub use memory::InMemoryVideoStore;
pub use postgres::PostgresVideoStore;
pub use store::{ChangeSet, Deletion, VideoStore};
