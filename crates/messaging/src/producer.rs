use std::time::Duration;

use domain::DomainEvent;
use tokio_util::sync::CancellationToken;

use crate::{
    ChannelManager, MessagingError, Result, RoutingTable,
    broker::{BrokerChannel, BrokerConnection, Confirmation},
};

/// Default bound on the wait for a publisher confirmation.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes domain events to the broker and waits for confirmation.
///
/// Events are serialized as JSON with their snake_case field names and
/// routed by kind. A publish only succeeds once the broker acknowledged
/// the message.
pub struct MessageProducer<C: BrokerConnection> {
    channels: ChannelManager<C>,
    routes: RoutingTable,
    confirm_timeout: Duration,
}

impl<C: BrokerConnection> MessageProducer<C> {
    /// Creates a producer with the default routes and confirm timeout.
    pub fn new(connection: C) -> Self {
        Self {
            channels: ChannelManager::new(connection),
            routes: RoutingTable::default(),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    /// Replaces the routing table.
    pub fn with_routes(mut self, routes: RoutingTable) -> Self {
        self.routes = routes;
        self
    }

    /// Sets the bound on the confirmation wait.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Returns the routing table.
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Publishes an event and waits for the broker to confirm it.
    ///
    /// Fails with `BrokerUnavailable` if no confirmation arrives within the
    /// confirm timeout, and with `NotAcknowledged` if the broker refuses
    /// the message.
    #[tracing::instrument(
        skip(self, event, cancel),
        fields(event_kind = %event.kind(), resource_id = %event.resource_id())
    )]
    pub async fn publish<E: DomainEvent>(&self, event: &E, cancel: &CancellationToken) -> Result<()> {
        let destination = self.routes.destination(event.kind())?;
        let payload = serde_json::to_vec(event)?;
        let key = event.resource_id().to_string();

        let confirmed = async {
            let channel = self.channels.get_or_create_channel().await?;
            channel.publish(destination, &key, &payload).await
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MessagingError::Cancelled),
            result = tokio::time::timeout(self.confirm_timeout, confirmed) => match result {
                Ok(Ok(Confirmation::Ack)) => Ok(()),
                Ok(Ok(Confirmation::Nack)) => Err(MessagingError::NotAcknowledged {
                    destination: destination.to_string(),
                }),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(MessagingError::BrokerUnavailable(format!(
                    "no confirmation from {destination} within {:?}",
                    self.confirm_timeout
                ))),
            },
        };

        let label = if outcome.is_ok() { "ack" } else { "failed" };
        metrics::counter!("broker_publish_total", "destination" => destination.to_string(), "outcome" => label)
            .increment(1);

        match &outcome {
            Ok(()) => tracing::debug!(%destination, "event published"),
            Err(err) => tracing::warn!(%destination, error = %err, "event publish failed"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use common::VideoId;
    use domain::{EventKind, MediaKind, VideoEvent};

    use super::*;
    use crate::InMemoryBroker;

    fn event() -> VideoEvent {
        VideoEvent::video_uploaded(VideoId::new(), MediaKind::Media, "raw/abc.mp4")
    }

    #[tokio::test]
    async fn test_publish_routes_and_serializes_snake_case() {
        let broker = InMemoryBroker::new();
        let producer = MessageProducer::new(broker.clone());
        let event = event();

        producer
            .publish(&event, &CancellationToken::new())
            .await
            .unwrap();

        let published = broker.published_json("video.uploaded").unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["kind"], "video_uploaded");
        assert_eq!(published[0]["file_path"], "raw/abc.mp4");
        assert_eq!(published[0]["resource_id"], event.resource_id().to_string());
        assert!(published[0].get("occurred_at").is_some());
        assert_eq!(
            broker.published_keys("video.uploaded"),
            vec![event.resource_id().to_string()]
        );
    }

    #[tokio::test]
    async fn test_unmapped_kind_fails_without_publishing() {
        let broker = InMemoryBroker::new();
        let producer = MessageProducer::new(broker.clone()).with_routes(RoutingTable::empty());

        let result = producer.publish(&event(), &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(MessagingError::NoRoute(EventKind::VideoUploaded))
        ));
        assert_eq!(broker.channels_opened(), 0);
    }

    #[tokio::test]
    async fn test_nack_is_not_acknowledged() {
        let broker = InMemoryBroker::new();
        broker.set_nack(true);
        let producer = MessageProducer::new(broker.clone());

        let result = producer.publish(&event(), &CancellationToken::new()).await;

        assert!(matches!(result, Err(MessagingError::NotAcknowledged { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_unavailable() {
        let broker = InMemoryBroker::new();
        broker.set_unavailable(true);
        let producer = MessageProducer::new(broker.clone());

        let result = producer.publish(&event(), &CancellationToken::new()).await;

        assert!(matches!(result, Err(MessagingError::BrokerUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_confirmation_times_out() {
        let broker = InMemoryBroker::new();
        broker.set_confirm_delay(Some(Duration::from_secs(60)));
        let producer =
            MessageProducer::new(broker.clone()).with_confirm_timeout(Duration::from_millis(100));

        let result = producer.publish(&event(), &CancellationToken::new()).await;

        assert!(matches!(result, Err(MessagingError::BrokerUnavailable(_))));
        assert!(broker.published("video.uploaded").is_empty());
    }

    #[tokio::test]
    async fn test_closed_channel_is_reopened_on_publish() {
        let broker = InMemoryBroker::new();
        let producer = MessageProducer::new(broker.clone());
        let cancel = CancellationToken::new();

        producer.publish(&event(), &cancel).await.unwrap();
        broker.close_channels();
        producer.publish(&event(), &cancel).await.unwrap();

        assert_eq!(broker.channels_opened(), 2);
        assert_eq!(broker.published("video.uploaded").len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_publish_fails() {
        let broker = InMemoryBroker::new();
        let producer = MessageProducer::new(broker.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = producer.publish(&event(), &cancel).await;

        assert!(matches!(result, Err(MessagingError::Cancelled)));
        assert!(broker.published("video.uploaded").is_empty());
    }
}
