//! Integration tests for the worker's routes and listener.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use application::{
    CreateVideo, InMemoryStorage, MediaUpload, UploadMedias, UploadSlot, VideoService,
    video_event_publisher,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{MediaKind, MediaStatus, Rating, VideoDetails};
use messaging::{InMemoryBroker, MessageProducer};
use metrics_exporter_prometheus::PrometheusHandle;
use persistence::InMemoryVideoStore;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use worker::{AppState, EncoderResultListener};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup(listener_stopped: CancellationToken) -> axum::Router {
    worker::create_app(AppState {
        metrics: get_metrics_handle(),
        listener_stopped,
    })
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = get(setup(CancellationToken::new()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["listener"], "running");
}

#[tokio::test]
async fn test_health_degrades_when_listener_stops() {
    let stopped = CancellationToken::new();
    stopped.cancel();

    let (status, body) = get(setup(stopped), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["listener"], "stopped");
}

#[tokio::test]
async fn test_listener_reconciles_and_exposes_metrics() {
    let app = setup(CancellationToken::new());
    let broker = InMemoryBroker::new();
    let producer = Arc::new(MessageProducer::new(broker.clone()));
    let service = Arc::new(VideoService::new(
        InMemoryVideoStore::new(),
        InMemoryStorage::new(),
        Arc::new(video_event_publisher(producer).unwrap()),
    ));
    let cancel = CancellationToken::new();

    let id = service
        .create_video(
            CreateVideo::new(VideoDetails {
                title: "Worker video".to_string(),
                description: "Encoded by the pipeline".to_string(),
                year_launched: 2020,
                duration: 15,
                opened: true,
                published: true,
                rating: Rating::Age16,
            }),
            &cancel,
        )
        .await
        .unwrap()
        .id;
    service
        .upload_medias(
            UploadMedias {
                video_id: id,
                files: vec![MediaUpload {
                    slot: UploadSlot::Media(MediaKind::Trailer),
                    file_name: "trailer.mp4".to_string(),
                    content_type: "video/mp4".to_string(),
                    data: b"raw".to_vec(),
                }],
            },
            &cancel,
        )
        .await
        .unwrap();

    for result in [
        serde_json::json!({ "video_id": id, "status": "processing", "media_kind": "trailer" }),
        serde_json::json!({
            "video_id": id,
            "status": "error",
            "media_kind": "trailer",
            "error_message": "unsupported codec",
        }),
    ] {
        broker.push("video.encoded", result.to_string());
    }

    let listener = EncoderResultListener::new(Arc::clone(&service), broker.source("video.encoded"))
        .with_retry_delay(Duration::from_millis(10));
    let handle = tokio::spawn(listener.run(cancel.clone()));

    // Wait for both results to be settled, then stop the listener.
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.acked("video.encoded") < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("results were not processed");
    cancel.cancel();
    handle.await.unwrap();

    let video = service.get_video(id).await.unwrap();
    assert_eq!(video.trailer.unwrap().status, MediaStatus::Error);

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("encoder_results_processed_total"));
}
