use std::collections::HashMap;

use domain::EventKind;

use crate::{MessagingError, Result};

/// Default destination for `video_uploaded` events.
pub const VIDEO_UPLOADED_DESTINATION: &str = "video.uploaded";

/// Static mapping from event kind to broker destination.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<EventKind, String>,
}

impl RoutingTable {
    /// Creates a table with no routes.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Adds or replaces the destination for a kind.
    pub fn with_route(mut self, kind: EventKind, destination: impl Into<String>) -> Self {
        self.routes.insert(kind, destination.into());
        self
    }

    /// Returns the destination for a kind.
    pub fn destination(&self, kind: EventKind) -> Result<&str> {
        self.routes
            .get(&kind)
            .map(String::as_str)
            .ok_or(MessagingError::NoRoute(kind))
    }

    /// Returns the kinds that have no destination.
    pub fn missing_routes(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| !self.routes.contains_key(kind))
            .collect()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::empty().with_route(EventKind::VideoUploaded, VIDEO_UPLOADED_DESTINATION)
    }
}
