use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_URL: &str = "nats://localhost:4222";
pub const DEFAULT_STREAM: &str = "SAGA_COMMANDS";
pub const DEFAULT_SUBJECT: &str = "saga.commands";
pub const DEFAULT_CONSUMER: &str = "saga-controller";

/// Connection and delivery settings for [`NatsTransport`](crate::NatsTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsTransportConfig {
    pub url: String,
    /// JetStream stream capturing `subject`.
    pub stream: String,
    /// Subject every saga command is published to.
    pub subject: String,
    /// Durable consumer name, shared by all controller replicas.
    pub consumer: String,
    /// How long a delivered command may stay unacknowledged before the
    /// server redelivers it.
    pub ack_wait: Duration,
    /// Deliveries before the server stops redelivering a command.
    pub max_deliver: i64,
}

impl Default for NatsTransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            stream: DEFAULT_STREAM.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            consumer: DEFAULT_CONSUMER.to_string(),
            ack_wait: Duration::from_secs(30),
            max_deliver: 5,
        }
    }
}

impl NatsTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_stream(mut self, stream: impl Into<String>, subject: impl Into<String>) -> Self {
        self.stream = stream.into();
        self.subject = subject.into();
        self
    }

    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }

    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }

    pub fn with_max_deliver(mut self, max_deliver: i64) -> Self {
        self.max_deliver = max_deliver;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NatsTransportConfig::default();
        assert_eq!(config.url, "nats://localhost:4222");
        assert_eq!(config.stream, "SAGA_COMMANDS");
        assert_eq!(config.subject, "saga.commands");
        assert_eq!(config.consumer, "saga-controller");
        assert_eq!(config.ack_wait, Duration::from_secs(30));
        assert_eq!(config.max_deliver, 5);
    }

    #[test]
    fn test_builder_overrides() {
        let config = NatsTransportConfig::new("nats://broker:4222")
            .with_stream("ORDERS", "orders.saga")
            .with_consumer("orders-controller")
            .with_ack_wait(Duration::from_secs(5))
            .with_max_deliver(10);

        assert_eq!(config.url, "nats://broker:4222");
        assert_eq!(config.stream, "ORDERS");
        assert_eq!(config.subject, "orders.saga");
        assert_eq!(config.consumer, "orders-controller");
        assert_eq!(config.ack_wait, Duration::from_secs(5));
        assert_eq!(config.max_deliver, 10);
    }
}
