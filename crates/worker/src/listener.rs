//! Consumes encoder results and reconciles media status.

use std::sync::Arc;
use std::time::Duration;

use application::{StorageService, UpdateMediaStatus, VideoService};
use messaging::{Delivery, MessageSource};
use persistence::VideoStore;
use tokio_util::sync::CancellationToken;

/// Default pause after a requeue or a failed receive.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The status was applied and the message acked.
    Applied,
    /// The message can never succeed; it was acked and dropped.
    Rejected,
    /// A transient failure; the message was put back.
    Requeued,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Rejected => "rejected",
            Outcome::Requeued => "requeued",
        }
    }
}

/// Reads encoder results from a [`MessageSource`] and feeds them to
/// [`VideoService::update_media_status`].
///
/// Each result is a JSON object with `video_id`, `status`, and optionally
/// `media_kind`, `encoded_path` and `error_message`.
pub struct EncoderResultListener<S, T, M>
where
    S: VideoStore + Clone,
    T: StorageService,
    M: MessageSource,
{
    service: Arc<VideoService<S, T>>,
    source: M,
    retry_delay: Duration,
}

impl<S, T, M> EncoderResultListener<S, T, M>
where
    S: VideoStore + Clone,
    T: StorageService,
    M: MessageSource,
{
    pub fn new(service: Arc<VideoService<S, T>>, source: M) -> Self {
        Self {
            service,
            source,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Processes deliveries until cancelled or the source is exhausted.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("encoder result listener started");

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.source.receive() => received,
            };

            match received {
                Ok(Some(delivery)) => {
                    if self.process(&delivery, &cancel).await == Outcome::Requeued
                        && !self.pause(&cancel).await
                    {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to receive encoder result");
                    if !self.pause(&cancel).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("encoder result listener stopped");
    }

    /// Handles one delivery and settles it with the source.
    pub async fn process(&self, delivery: &Delivery, cancel: &CancellationToken) -> Outcome {
        let outcome = match serde_json::from_slice::<UpdateMediaStatus>(&delivery.payload) {
            Err(err) => {
                tracing::error!(
                    error = %err,
                    offset = delivery.receipt.offset,
                    "dropping undecodable encoder result"
                );
                Outcome::Rejected
            }
            Ok(input) => {
                let video_id = input.video_id;
                match self.service.update_media_status(input, cancel).await {
                    Ok(_) => Outcome::Applied,
                    Err(err) if err.is_retryable() => {
                        tracing::warn!(%video_id, error = %err, "encoder result will be retried");
                        Outcome::Requeued
                    }
                    Err(err) => {
                        tracing::error!(%video_id, error = %err, "dropping encoder result");
                        Outcome::Rejected
                    }
                }
            }
        };

        let settled = match outcome {
            Outcome::Requeued => self.source.requeue(delivery).await,
            Outcome::Applied | Outcome::Rejected => self.source.ack(delivery).await,
        };
        if let Err(err) = settled {
            tracing::warn!(error = %err, outcome = outcome.as_str(), "failed to settle delivery");
        }

        metrics::counter!("encoder_results_processed_total", "outcome" => outcome.as_str())
            .increment(1);
        outcome
    }

    /// Waits out the retry delay. Returns false if cancelled meanwhile.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.retry_delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use application::{
        CreateVideo, InMemoryStorage, MediaUpload, UploadMedias, UploadSlot, video_event_publisher,
    };
    use common::VideoId;
    use domain::{MediaKind, MediaStatus, Rating, VideoDetails};
    use messaging::{InMemoryBroker, InMemorySource, MessageProducer};
    use persistence::InMemoryVideoStore;

    use super::*;

    const RESULTS: &str = "video.encoded";

    type Listener = EncoderResultListener<InMemoryVideoStore, InMemoryStorage, InMemorySource>;

    struct Harness {
        store: InMemoryVideoStore,
        broker: InMemoryBroker,
        service: Arc<VideoService<InMemoryVideoStore, InMemoryStorage>>,
    }

    impl Harness {
        fn new() -> Self {
            let store = InMemoryVideoStore::new();
            let broker = InMemoryBroker::new();
            let producer = Arc::new(MessageProducer::new(broker.clone()));
            let publisher = Arc::new(video_event_publisher(producer).unwrap());
            let service = Arc::new(VideoService::new(
                store.clone(),
                InMemoryStorage::new(),
                publisher,
            ));
            Self {
                store,
                broker,
                service,
            }
        }

        fn listener(&self) -> Listener {
            EncoderResultListener::new(Arc::clone(&self.service), self.broker.source(RESULTS))
                .with_retry_delay(Duration::from_millis(10))
        }

        async fn uploaded_video(&self) -> VideoId {
            let cancel = CancellationToken::new();
            let details = VideoDetails {
                title: "Listener video".to_string(),
                description: "Waiting for the encoder".to_string(),
                year_launched: 2021,
                duration: 30,
                opened: false,
                published: false,
                rating: Rating::Er,
            };
            let id = self
                .service
                .create_video(CreateVideo::new(details), &cancel)
                .await
                .unwrap()
                .id;
            self.service
                .upload_medias(
                    UploadMedias {
                        video_id: id,
                        files: vec![MediaUpload {
                            slot: UploadSlot::Media(MediaKind::Media),
                            file_name: "abc.mp4".to_string(),
                            content_type: "video/mp4".to_string(),
                            data: b"raw".to_vec(),
                        }],
                    },
                    &cancel,
                )
                .await
                .unwrap();
            id
        }

        fn push(&self, json: serde_json::Value) {
            self.broker.push(RESULTS, json.to_string());
        }

        async fn status(&self, id: VideoId) -> MediaStatus {
            self.service
                .get_video(id)
                .await
                .unwrap()
                .media
                .unwrap()
                .status
        }
    }

    #[tokio::test]
    async fn test_applies_results_and_acks() {
        let harness = Harness::new();
        let id = harness.uploaded_video().await;
        harness.push(serde_json::json!({ "video_id": id, "status": "processing" }));
        harness.push(serde_json::json!({
            "video_id": id,
            "status": "completed",
            "encoded_path": "enc/abc.mp4",
        }));
        harness.broker.close();

        harness.listener().run(CancellationToken::new()).await;

        assert_eq!(harness.status(id).await, MediaStatus::Completed);
        assert_eq!(harness.broker.acked(RESULTS), 2);
        assert_eq!(harness.broker.requeued(RESULTS), 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_acked_and_dropped() {
        let harness = Harness::new();
        harness.broker.push(RESULTS, "not json");
        let source = harness.broker.source(RESULTS);
        let delivery = source.receive().await.unwrap().unwrap();

        let outcome = harness
            .listener()
            .process(&delivery, &CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(harness.broker.acked(RESULTS), 1);
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected() {
        let harness = Harness::new();
        let id = harness.uploaded_video().await;
        harness.push(serde_json::json!({ "video_id": id, "status": "finished" }));
        harness.broker.close();

        harness.listener().run(CancellationToken::new()).await;

        assert_eq!(harness.status(id).await, MediaStatus::Pending);
        assert_eq!(harness.broker.acked(RESULTS), 1);
    }

    #[tokio::test]
    async fn test_missing_video_is_rejected() {
        let harness = Harness::new();
        harness.push(serde_json::json!({ "video_id": VideoId::new(), "status": "processing" }));
        let delivery = harness
            .broker
            .source(RESULTS)
            .receive()
            .await
            .unwrap()
            .unwrap();

        let outcome = harness
            .listener()
            .process(&delivery, &CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Rejected);
    }

    #[tokio::test]
    async fn test_store_failure_requeues() {
        let harness = Harness::new();
        let id = harness.uploaded_video().await;
        harness.store.set_fail_on_save(true);
        harness.push(serde_json::json!({ "video_id": id, "status": "processing" }));
        let source = harness.broker.source(RESULTS);
        let delivery = source.receive().await.unwrap().unwrap();

        let outcome = harness
            .listener()
            .process(&delivery, &CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Requeued);
        assert_eq!(harness.broker.requeued(RESULTS), 1);

        // Redelivered once the store recovers.
        harness.store.set_fail_on_save(false);
        let redelivered = source.receive().await.unwrap().unwrap();
        assert!(redelivered.redelivered);
        let outcome = harness
            .listener()
            .process(&redelivered, &CancellationToken::new())
            .await;
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(harness.status(id).await, MediaStatus::Processing);
    }

    #[tokio::test]
    async fn test_stops_on_cancellation() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(harness.listener().run(cancel.clone()));

        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener did not stop")
            .unwrap();
    }
}
