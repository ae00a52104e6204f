//! Event publisher and handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainEvent, EventKind, VideoEvent};
use messaging::{BrokerConnection, MessageProducer};
use tokio_util::sync::CancellationToken;

use crate::{ApplicationError, Result};

/// Reacts to one kind of domain event.
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    /// Handles the event. Errors are propagated to the publisher's caller.
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> Result<()>;
}

/// Dispatches events to the handlers registered for their kind.
///
/// Built through [`EventPublisher::builder`], which refuses to produce a
/// publisher unless every [`EventKind`] has at least one handler.
pub struct EventPublisher<E: DomainEvent> {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler<E>>>>,
}

impl<E: DomainEvent> EventPublisher<E> {
    pub fn builder() -> EventPublisherBuilder<E> {
        EventPublisherBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Dispatches an event to every handler of its kind, in registration order.
    ///
    /// The first failing handler stops the dispatch.
    #[tracing::instrument(skip(self, event, cancel), fields(event_kind = %event.kind()))]
    pub async fn publish(&self, event: &E, cancel: &CancellationToken) -> Result<()> {
        let kind = event.kind();
        let handlers = self
            .handlers
            .get(&kind)
            .ok_or(ApplicationError::UnhandledEvent(kind))?;

        for handler in handlers {
            handler.handle(event, cancel).await?;
        }

        metrics::counter!("events_dispatched_total", "kind" => kind.as_str()).increment(1);
        Ok(())
    }

    /// Returns the number of handlers registered for a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

/// Collects handler registrations for an [`EventPublisher`].
pub struct EventPublisherBuilder<E: DomainEvent> {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler<E>>>>,
}

impl<E: DomainEvent> EventPublisherBuilder<E> {
    /// Registers a handler for a kind.
    pub fn register(mut self, kind: EventKind, handler: impl EventHandler<E> + 'static) -> Self {
        self.handlers
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Builds the publisher, failing if any kind has no handler.
    pub fn build(self) -> Result<EventPublisher<E>> {
        let missing: Vec<EventKind> = EventKind::ALL
            .into_iter()
            .filter(|kind| !self.handlers.contains_key(kind))
            .collect();
        if !missing.is_empty() {
            return Err(ApplicationError::MissingHandlers(missing));
        }

        Ok(EventPublisher {
            handlers: self.handlers,
        })
    }

    /// Builds the publisher without checking that every kind is handled.
    #[cfg(test)]
    pub(crate) fn build_unchecked(self) -> EventPublisher<E> {
        EventPublisher {
            handlers: self.handlers,
        }
    }
}

/// Forwards `video_uploaded` events to the broker for encoding.
pub struct VideoUploadedHandler<C: BrokerConnection> {
    producer: Arc<MessageProducer<C>>,
}

impl<C: BrokerConnection> VideoUploadedHandler<C> {
    pub fn new(producer: Arc<MessageProducer<C>>) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl<C: BrokerConnection + 'static> EventHandler<VideoEvent> for VideoUploadedHandler<C> {
    async fn handle(&self, event: &VideoEvent, cancel: &CancellationToken) -> Result<()> {
        self.producer.publish(event, cancel).await?;
        Ok(())
    }
}

/// Builds the publisher used by the video use cases.
pub fn video_event_publisher<C: BrokerConnection + 'static>(
    producer: Arc<MessageProducer<C>>,
) -> Result<EventPublisher<VideoEvent>> {
    EventPublisher::builder()
        .register(
            EventKind::VideoUploaded,
            VideoUploadedHandler::new(producer),
        )
        .build()
}
