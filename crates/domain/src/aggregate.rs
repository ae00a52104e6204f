//! Core aggregate and domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of event kinds the catalog can raise.
///
/// Handlers and broker routes are keyed by this enum, so a new kind
/// must be added here before any aggregate can raise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A time-based media file was attached to a video.
    VideoUploaded,
}

impl EventKind {
    /// Every kind, used for startup completeness checks.
    pub const ALL: [EventKind; 1] = [EventKind::VideoUploaded];

    /// Returns the kind as a lower-snake-case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::VideoUploaded => "video_uploaded",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for domain events.
///
/// Domain events are immutable facts named in past tense. They carry the
/// id of the resource that raised them and the instant they occurred.
pub trait DomainEvent: Serialize + Send + Sync + Clone + std::fmt::Debug {
    /// Returns the concrete kind of this event.
    fn kind(&self) -> EventKind;

    /// Returns the id of the aggregate that raised the event.
    fn resource_id(&self) -> Uuid;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Insertion-ordered buffer of events raised by an aggregate.
///
/// Only the owning crate can append. Everyone else gets a read-only view
/// and the explicit [`EventBuffer::drain`].
#[derive(Debug, Clone, PartialEq)]
pub struct EventBuffer<E> {
    events: Vec<E>,
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventBuffer<E> {
    pub(crate) fn record(&mut self, event: E) {
        self.events.push(event);
    }

    /// Returns the buffered events in the order they were raised.
    pub fn as_slice(&self) -> &[E] {
        &self.events
    }

    /// Returns the number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Removes and returns every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }
}

/// Trait for aggregate roots that buffer domain events.
///
/// An aggregate mutates its own state and records the facts that other
/// systems care about. It never dispatches them: the unit of work reads
/// [`AggregateRoot::pending_events`], publishes them, and then calls
/// [`AggregateRoot::drain_events`].
pub trait AggregateRoot: Send + Sync {
    /// The type of the aggregate's identifier.
    type Id: Copy + Eq + std::hash::Hash + std::fmt::Display + Send + Sync;

    /// The type of events this aggregate raises.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier.
    fn id(&self) -> Self::Id;

    /// Returns the events raised since the last drain.
    fn pending_events(&self) -> &[Self::Event];

    /// Returns true if at least one event is waiting for dispatch.
    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }

    /// Removes every buffered event.
    ///
    /// Must only be called once all of them were dispatched.
    fn drain_events(&mut self) -> Vec<Self::Event>;
}
