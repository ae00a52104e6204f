//! Catalog worker.
//!
//! Runs the encoder result listener and serves `/health` and `/metrics`,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod listener;
pub mod routes;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use config::{BrokerKind, Config, ConfigError, LogFormat};
pub use listener::{EncoderResultListener, Outcome};

/// Shared state for the operational routes.
#[derive(Clone)]
pub struct AppState {
    pub metrics: PrometheusHandle,
    /// Cancelled once the listener task has exited.
    pub listener_stopped: CancellationToken,
}

/// Creates the Axum router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
