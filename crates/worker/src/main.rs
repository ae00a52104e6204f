//! Worker entry point.

use std::sync::Arc;

use application::{LocalStorage, VideoService, video_event_publisher};
use domain::EventKind;
use messaging::{BrokerConnection, InMemoryBroker, MessageProducer, MessageSource, RoutingTable};
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use persistence::{InMemoryVideoStore, PostgresVideoStore, VideoStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use worker::{AppState, BrokerKind, Config, EncoderResultListener};

/// Waits for a shutdown signal (SIGINT or SIGTERM), then cancels `cancel`.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
        () = cancel.cancelled() => {}
    }
    cancel.cancel();
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env().expect("invalid configuration");
    worker::init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the video store
    let cancel = CancellationToken::new();
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresVideoStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL video store");
            with_store(config, store, metrics_handle, cancel).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, videos are kept in memory");
            with_store(config, InMemoryVideoStore::new(), metrics_handle, cancel).await;
        }
    }
}

/// Picks the broker and runs the worker.
async fn with_store<S>(
    config: Config,
    store: S,
    metrics_handle: PrometheusHandle,
    cancel: CancellationToken,
) where
    S: VideoStore + Clone + 'static,
{
    match config.broker {
        BrokerKind::Memory => {
            let broker = InMemoryBroker::bounded(config.memory_broker_capacity);
            let source = broker.source(config.encoder_results_source.clone());
            run(config, store, broker, source, metrics_handle, cancel).await;
        }
        #[cfg(feature = "kafka")]
        BrokerKind::Kafka => {
            let connection = messaging::kafka::KafkaConnection::new(config.kafka_brokers.clone());
            let source = connection
                .source(&config.encoder_results_source, &config.kafka_group_id)
                .expect("failed to subscribe to encoder results");
            run(config, store, connection, source, metrics_handle, cancel).await;
        }
        #[cfg(not(feature = "kafka"))]
        BrokerKind::Kafka => {
            tracing::error!("BROKER=kafka requires building with the kafka feature");
            std::process::exit(1);
        }
    }
}

async fn run<S, C, M>(
    config: Config,
    store: S,
    connection: C,
    source: M,
    metrics_handle: PrometheusHandle,
    cancel: CancellationToken,
) where
    S: VideoStore + Clone + 'static,
    C: BrokerConnection + 'static,
    M: MessageSource + 'static,
{
    // 4. Wire the use cases
    let routes = RoutingTable::default().with_route(
        EventKind::VideoUploaded,
        config.video_uploaded_destination.clone(),
    );
    let missing = routes.missing_routes();
    if !missing.is_empty() {
        tracing::error!(?missing, "event kinds without a destination");
        std::process::exit(1);
    }
    let producer = Arc::new(
        MessageProducer::new(connection)
            .with_routes(routes)
            .with_confirm_timeout(config.confirm_timeout),
    );
    let publisher =
        Arc::new(video_event_publisher(producer).expect("every event kind needs a handler"));
    let storage = LocalStorage::new(config.storage_root.clone());
    let service = Arc::new(VideoService::new(store, storage, publisher));

    // 5. Start the encoder result listener
    let listener_stopped = CancellationToken::new();
    let listener = EncoderResultListener::new(service, source);
    let listener_task = tokio::spawn({
        let cancel = cancel.clone();
        let stopped = listener_stopped.clone();
        async move {
            listener.run(cancel).await;
            stopped.cancel();
        }
    });

    // 6. Serve health and metrics
    let app = worker::create_app(AppState {
        metrics: metrics_handle,
        listener_stopped,
    });
    let addr = config.addr();
    tracing::info!(%addr, broker = ?config.broker, "starting worker");

    let tcp = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .expect("server error");

    cancel.cancel();
    if let Err(err) = listener_task.await {
        tracing::error!(error = %err, "listener task failed");
    }
    tracing::info!("worker shut down gracefully");
}
