//! Broker ports.
//!
//! Producers talk to a [`BrokerChannel`] obtained from a
//! [`BrokerConnection`]; consumers read from a [`MessageSource`]. Adapters
//! exist for an in-process broker and, behind the `kafka` feature, Kafka.

use async_trait::async_trait;

use crate::Result;

/// The broker's answer to a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The broker durably accepted the message.
    Ack,

    /// The broker refused the message.
    Nack,
}

/// A channel over which messages are published with confirmation.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Returns false once the channel can no longer be used.
    fn is_open(&self) -> bool;

    /// Publishes a message and waits for the broker's confirmation.
    ///
    /// `key` identifies the resource the message is about. Brokers that
    /// partition use it to keep messages about one resource in order.
    async fn publish(&self, destination: &str, key: &str, payload: &[u8]) -> Result<Confirmation>;
}

/// A connection able to open publishing channels.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// The channel type opened by this connection.
    type Channel: BrokerChannel;

    /// Opens a new channel.
    async fn open_channel(&self) -> Result<Self::Channel>;
}

/// Position of a delivery within its source, used to ack or requeue it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub partition: i32,
    pub offset: i64,
}

/// A message received from a [`MessageSource`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,

    /// True if this message was handed out before and requeued.
    pub redelivered: bool,

    pub receipt: Receipt,
}

/// A source of inbound messages with explicit acknowledgement.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Waits for the next message. Returns `None` once the source is closed.
    async fn receive(&self) -> Result<Option<Delivery>>;

    /// Marks the message as processed.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Returns the message to the source so it is delivered again.
    async fn requeue(&self, delivery: &Delivery) -> Result<()>;
}
