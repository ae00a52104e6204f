//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use messaging::VIDEO_UPLOADED_DESTINATION;
use thiserror::Error;

/// A variable held a value that could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid value {value:?} for {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected text or json, got {other}")),
        }
    }
}

/// Which broker the worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrokerKind {
    /// In-process broker; nothing leaves the process.
    #[default]
    Memory,
    Kafka,
}

impl FromStr for BrokerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(BrokerKind::Memory),
            "kafka" => Ok(BrokerKind::Kafka),
            other => Err(format!("expected memory or kafka, got {other}")),
        }
    }
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset keeps videos in memory
/// - `BROKER`: `memory` or `kafka` (default: `memory`)
/// - `KAFKA_BROKERS`: bootstrap servers (default: `"localhost:9092"`)
/// - `KAFKA_GROUP_ID`: consumer group (default: `"catalog-worker"`)
/// - `VIDEO_UPLOADED_DESTINATION`: upload notification topic (default: `"video.uploaded"`)
/// - `ENCODER_RESULTS_SOURCE`: encoder result topic (default: `"video.encoded"`)
/// - `CONFIRM_TIMEOUT_MS`: broker confirmation wait (default: `5000`)
/// - `MEMORY_BROKER_CAPACITY`: unconsumed messages kept per destination
///   by the in-memory broker (default: `10000`)
/// - `STORAGE_ROOT`: local object storage directory (default: `"./storage"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub broker: BrokerKind,
    pub kafka_brokers: String,
    pub kafka_group_id: String,
    pub video_uploaded_destination: String,
    pub encoder_results_source: String,
    pub confirm_timeout: Duration,
    pub memory_broker_capacity: usize,
    pub storage_root: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |name: &str, default: String| lookup(name).unwrap_or(default);

        Ok(Self {
            host: text("HOST", defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
            log_level: text("RUST_LOG", defaults.log_level),
            log_format: parse(&lookup, "LOG_FORMAT", defaults.log_format)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            broker: parse(&lookup, "BROKER", defaults.broker)?,
            kafka_brokers: text("KAFKA_BROKERS", defaults.kafka_brokers),
            kafka_group_id: text("KAFKA_GROUP_ID", defaults.kafka_group_id),
            video_uploaded_destination: text(
                "VIDEO_UPLOADED_DESTINATION",
                defaults.video_uploaded_destination,
            ),
            encoder_results_source: text("ENCODER_RESULTS_SOURCE", defaults.encoder_results_source),
            confirm_timeout: parse::<u64, _>(&lookup, "CONFIRM_TIMEOUT_MS", 5000)
                .map(Duration::from_millis)?,
            memory_broker_capacity: parse(
                &lookup,
                "MEMORY_BROKER_CAPACITY",
                defaults.memory_broker_capacity,
            )?,
            storage_root: lookup("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|err: T::Err| ConfigError {
            name,
            reason: err.to_string(),
            value,
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            broker: BrokerKind::Memory,
            kafka_brokers: "localhost:9092".to_string(),
            kafka_group_id: "catalog-worker".to_string(),
            video_uploaded_destination: VIDEO_UPLOADED_DESTINATION.to_string(),
            encoder_results_source: "video.encoded".to_string(),
            confirm_timeout: Duration::from_millis(5000),
            memory_broker_capacity: 10_000,
            storage_root: PathBuf::from("./storage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.broker, BrokerKind::Memory);
        assert_eq!(config.video_uploaded_destination, "video.uploaded");
        assert_eq!(config.encoder_results_source, "video.encoded");
        assert_eq!(config.confirm_timeout, Duration::from_secs(5));
        assert_eq!(config.memory_broker_capacity, 10_000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "json"),
            ("BROKER", "kafka"),
            ("DATABASE_URL", "postgres://localhost/catalog"),
            ("CONFIRM_TIMEOUT_MS", "250"),
            ("MEMORY_BROKER_CAPACITY", "64"),
            ("STORAGE_ROOT", "/var/media"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.broker, BrokerKind::Kafka);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/catalog")
        );
        assert_eq!(config.confirm_timeout, Duration::from_millis(250));
        assert_eq!(config.memory_broker_capacity, 64);
        assert_eq!(config.storage_root, PathBuf::from("/var/media"));
    }

    #[test]
    fn test_empty_database_url_means_in_memory() {
        let config = load(&[("DATABASE_URL", "")]).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.name, "PORT");
        assert_eq!(err.value, "eighty");

        let err = load(&[("BROKER", "rabbit")]).unwrap_err();
        assert_eq!(err.name, "BROKER");
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
