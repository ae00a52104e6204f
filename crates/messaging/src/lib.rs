//! Messaging layer for the video catalog.
//!
//! This crate provides:
//! - Broker ports for confirmed publishing and acknowledged consumption
//! - A [`ChannelManager`] that owns the shared, lazily reopened channel
//! - The [`MessageProducer`] that routes domain events by kind
//! - An in-memory broker and, with the `kafka` feature, a Kafka adapter

pub mod broker;
mod channel;
mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
mod memory;
mod producer;
mod routing;

pub use broker::{BrokerChannel, BrokerConnection, Confirmation, Delivery, MessageSource, Receipt};
pub use channel::ChannelManager;
pub use error::{MessagingError, Result};
pub use memory::{InMemoryBroker, InMemoryChannel, InMemorySource};
pub use producer::{DEFAULT_CONFIRM_TIMEOUT, MessageProducer};
pub use routing::{RoutingTable, VIDEO_UPLOADED_DESTINATION};
