//! Kafka adapter.
//!
//! Producer channels use `acks=all`, so a delivery report means every
//! in-sync replica has the message. The consumer stores offsets manually
//! and only after a message is acked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};

use crate::{
    MessagingError, Result,
    broker::{BrokerChannel, BrokerConnection, Confirmation, Delivery, MessageSource, Receipt},
};

/// How long a send may wait for room in the local producer queue.
const QUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection settings for a Kafka cluster.
#[derive(Debug, Clone)]
pub struct KafkaConnection {
    brokers: String,
}

impl KafkaConnection {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
        }
    }

    /// Creates a consumer for `topic` in consumer group `group_id`.
    pub fn source(&self, topic: &str, group_id: &str) -> Result<KafkaSource> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .create()
            .map_err(unavailable)?;

        consumer.subscribe(&[topic]).map_err(unavailable)?;
        tracing::info!(brokers = %self.brokers, %topic, %group_id, "kafka consumer subscribed");

        Ok(KafkaSource {
            consumer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl BrokerConnection for KafkaConnection {
    type Channel = KafkaChannel;

    async fn open_channel(&self) -> Result<KafkaChannel> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .create()
            .map_err(unavailable)?;

        Ok(KafkaChannel {
            producer,
            open: AtomicBool::new(true),
        })
    }
}

/// Producer channel over a [`FutureProducer`].
pub struct KafkaChannel {
    producer: FutureProducer,
    open: AtomicBool,
}

#[async_trait]
impl BrokerChannel for KafkaChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn publish(&self, destination: &str, key: &str, payload: &[u8]) -> Result<Confirmation> {
        let record = FutureRecord::to(destination).key(key).payload(payload);

        match self.producer.send(record, QUEUE_TIMEOUT).await {
            Ok(_) => Ok(Confirmation::Ack),
            // The cluster answered and refused this message.
            Err((KafkaError::MessageProduction(code), _)) => {
                tracing::warn!(%destination, ?code, "kafka rejected message");
                Ok(Confirmation::Nack)
            }
            Err((err, _)) => {
                self.open.store(false, Ordering::Release);
                Err(unavailable(err))
            }
        }
    }
}

/// Consumer over one Kafka topic.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn receive(&self) -> Result<Option<Delivery>> {
        let message = self.consumer.recv().await.map_err(unavailable)?;
        Ok(Some(Delivery {
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            redelivered: false,
            receipt: Receipt {
                partition: message.partition(),
                offset: message.offset(),
            },
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        // Kafka commits the offset of the next message to read.
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &self.topic,
                delivery.receipt.partition,
                Offset::Offset(delivery.receipt.offset + 1),
            )
            .map_err(unavailable)?;
        self.consumer.store_offsets(&offsets).map_err(unavailable)
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<()> {
        self.consumer
            .seek(
                &self.topic,
                delivery.receipt.partition,
                Offset::Offset(delivery.receipt.offset),
                Duration::from_secs(5),
            )
            .map_err(unavailable)
    }
}

fn unavailable(err: KafkaError) -> MessagingError {
    MessagingError::BrokerUnavailable(err.to_string())
}
