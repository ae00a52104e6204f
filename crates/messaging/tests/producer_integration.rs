//! Integration tests for the message producer over the in-memory broker.

use std::sync::Arc;

use common::VideoId;
use domain::{MediaKind, VideoEvent};
use messaging::{InMemoryBroker, MessageProducer, MessageSource, RoutingTable};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn concurrent_publishers_share_one_channel() {
    let broker = InMemoryBroker::new();
    let producer = Arc::new(MessageProducer::new(broker.clone()));
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for i in 0..20 {
        let producer = Arc::clone(&producer);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let event =
                VideoEvent::video_uploaded(VideoId::new(), MediaKind::Media, format!("raw/{i}.mp4"));
            producer.publish(&event, &cancel).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(broker.channels_opened(), 1);
    assert_eq!(broker.published("video.uploaded").len(), 20);
}

#[tokio::test]
async fn published_events_can_be_consumed() {
    let broker = InMemoryBroker::new();
    let routes = RoutingTable::default()
        .with_route(domain::EventKind::VideoUploaded, "encoder.jobs");
    let producer = MessageProducer::new(broker.clone()).with_routes(routes);
    let id = VideoId::new();

    producer
        .publish(
            &VideoEvent::video_uploaded(id, MediaKind::Trailer, "raw/trailer.mp4"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let source = broker.source("encoder.jobs");
    let delivery = source.receive().await.unwrap().unwrap();
    let event: VideoEvent = serde_json::from_slice(&delivery.payload).unwrap();
    let VideoEvent::VideoUploaded(data) = event;
    assert_eq!(data.resource_id, id);
    assert_eq!(data.media_kind, MediaKind::Trailer);

    source.ack(&delivery).await.unwrap();
    assert_eq!(broker.acked("encoder.jobs"), 1);
}
