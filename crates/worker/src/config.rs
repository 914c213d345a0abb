//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use transport_nats::NatsTransportConfig;

/// Where saga transitions are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryBackend {
    Memory,
    JsonLines(PathBuf),
    Postgres(String),
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must be set when STATE_REPOSITORY={1}")]
    Missing(&'static str, &'static str),
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `NATS_URL`, `SAGA_STREAM`, `SAGA_SUBJECT`, `SAGA_CONSUMER`: broker
///   connection and queue naming
/// - `SAGA_ACK_WAIT_SECS` (default `30`), `SAGA_MAX_DELIVER` (default `5`)
/// - `STATE_REPOSITORY`: `memory` (default), `jsonl` or `postgres`
/// - `SAGA_LOG_FILE` (default `saga.log`): transition log for `jsonl`
/// - `DATABASE_URL`: required for `postgres`
/// - `METRICS_PORT` (default `9000`): Prometheus listener, `0` disables it
/// - `SAGA_STRICT_AUDIT` (default `false`)
/// - `LOG_FORMAT`: `pretty` (default) or `json`
#[derive(Debug, Clone)]
pub struct Config {
    pub transport: NatsTransportConfig,
    pub repository: RepositoryBackend,
    pub metrics_port: u16,
    pub strict_audit: bool,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = NatsTransportConfig::default();
        let ack_wait = match lookup("SAGA_ACK_WAIT_SECS") {
            Some(value) => Duration::from_secs(parse(
                "SAGA_ACK_WAIT_SECS",
                "a number of seconds",
                value,
            )?),
            None => defaults.ack_wait,
        };
        let max_deliver = match lookup("SAGA_MAX_DELIVER") {
            Some(value) => parse("SAGA_MAX_DELIVER", "a positive integer", value)?,
            None => defaults.max_deliver,
        };
        let transport = NatsTransportConfig {
            url: lookup("NATS_URL").unwrap_or(defaults.url),
            stream: lookup("SAGA_STREAM").unwrap_or(defaults.stream),
            subject: lookup("SAGA_SUBJECT").unwrap_or(defaults.subject),
            consumer: lookup("SAGA_CONSUMER").unwrap_or(defaults.consumer),
            ack_wait,
            max_deliver,
        };

        let repository = match lookup("STATE_REPOSITORY").as_deref() {
            None | Some("memory") => RepositoryBackend::Memory,
            Some("jsonl") => RepositoryBackend::JsonLines(
                lookup("SAGA_LOG_FILE")
                    .unwrap_or_else(|| "saga.log".to_string())
                    .into(),
            ),
            Some("postgres") => RepositoryBackend::Postgres(
                lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL", "postgres"))?,
            ),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STATE_REPOSITORY",
                    expected: "one of memory, jsonl, postgres",
                    value: other.to_string(),
                });
            }
        };

        let metrics_port = match lookup("METRICS_PORT") {
            Some(value) => parse("METRICS_PORT", "a port number", value)?,
            None => 9000,
        };
        let strict_audit = match lookup("SAGA_STRICT_AUDIT").as_deref() {
            None | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "SAGA_STRICT_AUDIT",
                    expected: "true or false",
                    value: other.to_string(),
                });
            }
        };
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            transport,
            repository,
            metrics_port,
            strict_audit,
            log_format,
        })
    }

    /// Returns the Prometheus listener address, if enabled.
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        (self.metrics_port != 0).then(|| ([0, 0, 0, 0], self.metrics_port).into())
    }
}

fn parse<T: std::str::FromStr>(
    name: &'static str,
    expected: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        expected,
        value,
    })
}
