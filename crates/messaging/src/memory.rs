//! In-process broker for tests and single-node runs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    MessagingError, Result,
    broker::{BrokerChannel, BrokerConnection, Confirmation, Delivery, MessageSource, Receipt},
};

#[derive(Debug, Clone)]
struct StoredMessage {
    offset: i64,
    key: String,
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct Queue {
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<i64, StoredMessage>,
    /// Every message published, in publish order, unless history is off.
    log: Vec<StoredMessage>,
    next_offset: i64,
    acked: usize,
    requeued: usize,
    dropped: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Retention {
    discard_history: bool,
    /// Most unconsumed messages kept per destination.
    capacity: Option<usize>,
}

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, Queue>,
    retention: Retention,
    generation: u64,
    channels_opened: usize,
    unavailable: bool,
    nack: bool,
    confirm_delay: Option<Duration>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<BrokerState>,
    notify: Notify,
}

/// In-memory broker with failure injection.
///
/// Published messages land in a per-destination queue that can be read
/// back with [`InMemoryBroker::published`] or consumed through
/// [`InMemoryBroker::source`]. A broker built with
/// [`InMemoryBroker::bounded`] keeps no history and caps each queue, so
/// memory stays flat in long-running processes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker that keeps no history and holds at most `capacity`
    /// unconsumed messages per destination, dropping the oldest first.
    pub fn bounded(capacity: usize) -> Self {
        let broker = Self::default();
        broker.lock().retention = Retention {
            discard_history: true,
            capacity: Some(capacity.max(1)),
        };
        broker
    }

    /// Makes channel creation and publishing fail as if the broker were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Makes the broker refuse every published message.
    pub fn set_nack(&self, nack: bool) {
        self.lock().nack = nack;
    }

    /// Delays every confirmation.
    pub fn set_confirm_delay(&self, delay: Option<Duration>) {
        self.lock().confirm_delay = delay;
    }

    /// Closes every channel opened so far.
    pub fn close_channels(&self) {
        self.lock().generation += 1;
    }

    /// Returns how many channels were opened.
    pub fn channels_opened(&self) -> usize {
        self.lock().channels_opened
    }

    /// Returns the payloads published to a destination, oldest first.
    ///
    /// Always empty for a [`InMemoryBroker::bounded`] broker.
    pub fn published(&self, destination: &str) -> Vec<Vec<u8>> {
        self.lock()
            .queues
            .get(destination)
            .map(|queue| queue.log.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the keys published to a destination, oldest first.
    pub fn published_keys(&self, destination: &str) -> Vec<String> {
        self.lock()
            .queues
            .get(destination)
            .map(|queue| queue.log.iter().map(|m| m.key.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the published payloads of a destination parsed as JSON.
    pub fn published_json(&self, destination: &str) -> Result<Vec<serde_json::Value>> {
        self.published(destination)
            .iter()
            .map(|payload| serde_json::from_slice(payload).map_err(MessagingError::from))
            .collect()
    }

    /// Enqueues a message directly, bypassing channels and failure flags.
    pub fn push(&self, destination: &str, payload: impl Into<Vec<u8>>) {
        self.lock().enqueue(destination, String::new(), payload.into());
        self.shared.notify.notify_waiters();
    }

    /// Returns a consumer for a destination.
    pub fn source(&self, destination: impl Into<String>) -> InMemorySource {
        InMemorySource {
            shared: Arc::clone(&self.shared),
            destination: destination.into(),
        }
    }

    /// Returns how many messages of a destination were acked.
    pub fn acked(&self, destination: &str) -> usize {
        self.lock().queues.get(destination).map_or(0, |q| q.acked)
    }

    /// Returns how many messages of a destination were requeued.
    pub fn requeued(&self, destination: &str) -> usize {
        self.lock().queues.get(destination).map_or(0, |q| q.requeued)
    }

    /// Returns how many unconsumed messages of a destination were dropped
    /// because its queue was full.
    pub fn dropped(&self, destination: &str) -> usize {
        self.lock().queues.get(destination).map_or(0, |q| q.dropped)
    }

    /// Closes every source once its queue is drained.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.notify.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.shared.lock()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BrokerState {
    fn enqueue(&mut self, destination: &str, key: String, payload: Vec<u8>) {
        let retention = self.retention;
        let queue = self.queues.entry(destination.to_string()).or_default();
        let message = StoredMessage {
            offset: queue.next_offset,
            key,
            payload,
            redelivered: false,
        };
        queue.next_offset += 1;
        if !retention.discard_history {
            queue.log.push(message.clone());
        }
        queue.ready.push_back(message);

        if let Some(capacity) = retention.capacity {
            while queue.ready.len() > capacity {
                if let Some(oldest) = queue.ready.pop_front() {
                    queue.dropped += 1;
                    metrics::counter!("memory_broker_dropped_total").increment(1);
                    tracing::warn!(
                        destination,
                        offset = oldest.offset,
                        "in-memory queue full, dropping oldest message"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl BrokerConnection for InMemoryBroker {
    type Channel = InMemoryChannel;

    async fn open_channel(&self) -> Result<InMemoryChannel> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(MessagingError::BrokerUnavailable(
                "in-memory broker is down".to_string(),
            ));
        }
        state.channels_opened += 1;
        Ok(InMemoryChannel {
            shared: Arc::clone(&self.shared),
            generation: state.generation,
        })
    }
}

/// Channel handed out by [`InMemoryBroker`].
#[derive(Debug)]
pub struct InMemoryChannel {
    shared: Arc<Shared>,
    generation: u64,
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    fn is_open(&self) -> bool {
        let state = self.shared.lock();
        state.generation == self.generation && !state.unavailable
    }

    async fn publish(&self, destination: &str, key: &str, payload: &[u8]) -> Result<Confirmation> {
        let delay = {
            let state = self.shared.lock();
            if state.unavailable || state.generation != self.generation {
                return Err(MessagingError::BrokerUnavailable(
                    "in-memory channel is closed".to_string(),
                ));
            }
            state.confirm_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.shared.lock();
            if state.nack {
                return Ok(Confirmation::Nack);
            }
            state.enqueue(destination, key.to_string(), payload.to_vec());
        }
        self.shared.notify.notify_waiters();
        Ok(Confirmation::Ack)
    }
}

/// Consumer over one destination of an [`InMemoryBroker`].
#[derive(Debug, Clone)]
pub struct InMemorySource {
    shared: Arc<Shared>,
    destination: String,
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn receive(&self) -> Result<Option<Delivery>> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.lock();
                let closed = state.closed;
                let queue = state.queues.entry(self.destination.clone()).or_default();
                if let Some(message) = queue.ready.pop_front() {
                    let delivery = Delivery {
                        payload: message.payload.clone(),
                        redelivered: message.redelivered,
                        receipt: Receipt {
                            partition: 0,
                            offset: message.offset,
                        },
                    };
                    queue.in_flight.insert(message.offset, message);
                    return Ok(Some(delivery));
                }
                if closed {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut state = self.shared.lock();
        if let Some(queue) = state.queues.get_mut(&self.destination)
            && queue.in_flight.remove(&delivery.receipt.offset).is_some()
        {
            queue.acked += 1;
        }
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<()> {
        {
            let mut state = self.shared.lock();
            let Some(queue) = state.queues.get_mut(&self.destination) else {
                return Ok(());
            };
            if let Some(mut message) = queue.in_flight.remove(&delivery.receipt.offset) {
                message.redelivered = true;
                queue.ready.push_front(message);
                queue.requeued += 1;
            }
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_is_acked_and_recorded() {
        let broker = InMemoryBroker::new();
        let channel = broker.open_channel().await.unwrap();

        let confirmation = channel.publish("jobs", "k1", b"hello").await.unwrap();

        assert_eq!(confirmation, Confirmation::Ack);
        assert_eq!(broker.published("jobs"), vec![b"hello".to_vec()]);
        assert_eq!(broker.published_keys("jobs"), vec!["k1".to_string()]);
    }

    #[tokio::test]
    async fn test_nack_records_nothing() {
        let broker = InMemoryBroker::new();
        broker.set_nack(true);
        let channel = broker.open_channel().await.unwrap();

        let confirmation = channel.publish("jobs", "k1", b"hello").await.unwrap();

        assert_eq!(confirmation, Confirmation::Nack);
        assert!(broker.published("jobs").is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_broker_refuses_channels() {
        let broker = InMemoryBroker::new();
        broker.set_unavailable(true);
        assert!(matches!(
            broker.open_channel().await,
            Err(MessagingError::BrokerUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_source_receives_in_order_and_acks() {
        let broker = InMemoryBroker::new();
        broker.push("results", "first");
        broker.push("results", "second");
        let source = broker.source("results");

        let first = source.receive().await.unwrap().unwrap();
        let second = source.receive().await.unwrap().unwrap();
        assert_eq!(first.payload, b"first");
        assert_eq!(second.payload, b"second");

        source.ack(&first).await.unwrap();
        source.ack(&second).await.unwrap();
        assert_eq!(broker.acked("results"), 2);
    }

    #[tokio::test]
    async fn test_requeued_message_is_redelivered_first() {
        let broker = InMemoryBroker::new();
        broker.push("results", "a");
        broker.push("results", "b");
        let source = broker.source("results");

        let a = source.receive().await.unwrap().unwrap();
        source.requeue(&a).await.unwrap();

        let again = source.receive().await.unwrap().unwrap();
        assert_eq!(again.payload, b"a");
        assert!(again.redelivered);
        assert_eq!(broker.requeued("results"), 1);
    }

    #[tokio::test]
    async fn test_receive_waits_for_publish() {
        let broker = InMemoryBroker::new();
        let source = broker.source("results");

        let waiter = tokio::spawn(async move { source.receive().await });
        tokio::task::yield_now().await;
        broker.push("results", "late");

        let delivery = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(delivery.payload, b"late");
    }

    #[tokio::test]
    async fn test_bounded_broker_keeps_no_history() {
        let broker = InMemoryBroker::bounded(10);
        let channel = broker.open_channel().await.unwrap();
        let source = broker.source("jobs");

        channel.publish("jobs", "k1", b"hello").await.unwrap();

        assert!(broker.published("jobs").is_empty());
        let delivery = source.receive().await.unwrap().unwrap();
        assert_eq!(delivery.payload, b"hello");
        source.ack(&delivery).await.unwrap();
        assert_eq!(broker.acked("jobs"), 1);
    }

    #[tokio::test]
    async fn test_bounded_broker_drops_oldest_unconsumed() {
        let broker = InMemoryBroker::bounded(2);
        broker.push("jobs", "first");
        broker.push("jobs", "second");
        broker.push("jobs", "third");
        broker.close();
        let source = broker.source("jobs");

        assert_eq!(broker.dropped("jobs"), 1);
        let second = source.receive().await.unwrap().unwrap();
        let third = source.receive().await.unwrap().unwrap();
        assert_eq!(second.payload, b"second");
        assert_eq!(third.payload, b"third");
        assert!(source.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_source_returns_none_when_drained() {
        let broker = InMemoryBroker::new();
        broker.push("results", "last");
        broker.close();
        let source = broker.source("results");

        assert!(source.receive().await.unwrap().is_some());
        assert!(source.receive().await.unwrap().is_none());
    }
}
