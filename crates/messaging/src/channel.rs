use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    Result,
    broker::{BrokerChannel, BrokerConnection},
};

/// Owns a broker connection and the single channel shared by producers.
///
/// The channel is opened on first use and reopened whenever it is found
/// closed. The mutex serializes creation only; publishing happens on a
/// cloned handle outside the lock.
pub struct ChannelManager<C: BrokerConnection> {
    connection: C,
    channel: Mutex<Option<Arc<C::Channel>>>,
}

impl<C: BrokerConnection> ChannelManager<C> {
    /// Creates a manager with no open channel.
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            channel: Mutex::new(None),
        }
    }

    /// Returns the cached channel, opening a new one if none is open.
    pub async fn get_or_create_channel(&self) -> Result<Arc<C::Channel>> {
        let mut guard = self.channel.lock().await;

        if let Some(channel) = guard.as_ref() {
            if channel.is_open() {
                return Ok(Arc::clone(channel));
            }
            tracing::warn!("broker channel closed, reopening");
        }

        let channel = Arc::new(self.connection.open_channel().await?);
        metrics::counter!("broker_channels_opened_total").increment(1);
        tracing::debug!("broker channel opened");
        *guard = Some(Arc::clone(&channel));
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBroker;

    #[tokio::test]
    async fn test_channel_is_created_lazily_and_cached() {
        let broker = InMemoryBroker::new();
        let manager = ChannelManager::new(broker.clone());
        assert_eq!(broker.channels_opened(), 0);

        let first = manager.get_or_create_channel().await.unwrap();
        let second = manager.get_or_create_channel().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(broker.channels_opened(), 1);
    }

    #[tokio::test]
    async fn test_closed_channel_is_recreated() {
        let broker = InMemoryBroker::new();
        let manager = ChannelManager::new(broker.clone());
        let first = manager.get_or_create_channel().await.unwrap();

        broker.close_channels();
        assert!(!first.is_open());

        let second = manager.get_or_create_channel().await.unwrap();
        assert!(second.is_open());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(broker.channels_opened(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_channel() {
        let broker = InMemoryBroker::new();
        let manager = Arc::new(ChannelManager::new(broker.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.get_or_create_channel().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(broker.channels_opened(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_not_cached() {
        let broker = InMemoryBroker::new();
        let manager = ChannelManager::new(broker.clone());

        broker.set_unavailable(true);
        assert!(manager.get_or_create_channel().await.is_err());

        broker.set_unavailable(false);
        assert!(manager.get_or_create_channel().await.is_ok());
    }
}
