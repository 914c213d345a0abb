use async_nats::jetstream::{
    self, AckKind,
    consumer::{AckPolicy, DeliverPolicy, PullConsumer, pull},
    stream::{self, StorageType},
};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use saga::{Acknowledgement, CommandEnvelope, CommandHandler, CommandTransport, TransportError};

use crate::config::NatsTransportConfig;

/// Maps a handler verdict onto the JetStream acknowledgement sent back.
pub fn ack_kind(ack: Acknowledgement) -> AckKind {
    match ack {
        Acknowledgement::Ack => AckKind::Ack,
        Acknowledgement::Requeue => AckKind::Nak(None),
        Acknowledgement::Reject => AckKind::Term,
    }
}

/// How often a running handler tells the server it is still working on a
/// delivery: twice per `ack_wait`, and no faster than every 100ms.
pub fn progress_interval(ack_wait: Duration) -> Duration {
    (ack_wait / 2).max(Duration::from_millis(100))
}

/// Saga command transport over a JetStream stream.
///
/// Cheap to clone; clones share the underlying connection.
#[derive(Clone)]
pub struct NatsTransport {
    jetstream: jetstream::Context,
    config: NatsTransportConfig,
}

impl NatsTransport {
    /// Connects to the server and makes sure the command stream exists.
    #[tracing::instrument(skip(config), fields(url = %config.url, stream = %config.stream))]
    pub async fn connect(config: NatsTransportConfig) -> Result<Self, TransportError> {
        let client = async_nats::connect(config.url.as_str())
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let transport = Self::from_client(client, config);
        transport.ensure_stream().await?;
        Ok(transport)
    }

    /// Wraps an existing client without touching the server.
    pub fn from_client(client: async_nats::Client, config: NatsTransportConfig) -> Self {
        Self {
            jetstream: jetstream::new(client),
            config,
        }
    }

    pub fn config(&self) -> &NatsTransportConfig {
        &self.config
    }

    async fn ensure_stream(&self) -> Result<stream::Stream, TransportError> {
        let stream = self
            .jetstream
            .get_or_create_stream(stream::Config {
                name: self.config.stream.clone(),
                subjects: vec![self.config.subject.clone()],
                storage: StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| {
                TransportError::Connection(format!(
                    "failed to get or create stream {}: {e}",
                    self.config.stream
                ))
            })?;
        tracing::debug!(stream = %self.config.stream, "command stream ready");
        Ok(stream)
    }

    /// Runs the handler while resetting the delivery's ack timer, so a step
    /// slower than `ack_wait` is not redelivered to another worker mid-run.
    async fn handle_in_progress(
        &self,
        message: &jetstream::Message,
        handler: &dyn CommandHandler,
        envelope: CommandEnvelope,
    ) -> Acknowledgement {
        let handled = handler.handle(envelope);
        tokio::pin!(handled);

        let period = progress_interval(self.config.ack_wait);
        let mut heartbeat =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                ack = &mut handled => return ack,
                _ = heartbeat.tick() => {
                    if let Err(e) = message.ack_with(AckKind::Progress).await {
                        tracing::warn!(error = %e, "failed to extend ack deadline");
                    }
                }
            }
        }
    }

    async fn consumer(&self) -> Result<PullConsumer, TransportError> {
        let stream = self.ensure_stream().await?;
        stream
            .get_or_create_consumer(
                &self.config.consumer,
                pull::Config {
                    durable_name: Some(self.config.consumer.clone()),
                    deliver_policy: DeliverPolicy::All,
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: self.config.ack_wait,
                    max_deliver: self.config.max_deliver,
                    // One command in flight per consumer: a saga hop is
                    // never processed concurrently with its successor.
                    max_ack_pending: 1,
                    filter_subject: self.config.subject.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                TransportError::Consume(format!(
                    "failed to create consumer {}: {e}",
                    self.config.consumer
                ))
            })
    }
}

impl std::fmt::Debug for NatsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CommandTransport for NatsTransport {
    async fn publish(&self, envelope: &CommandEnvelope) -> Result<(), TransportError> {
        let body = envelope.to_bytes()?;
        self.jetstream
            .publish(self.config.subject.clone(), body.into())
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;

        metrics::counter!("nats_commands_published").increment(1);
        tracing::debug!(
            saga_id = %envelope.saga_id,
            step = %envelope.step_name,
            direction = %envelope.direction,
            "command published"
        );
        Ok(())
    }

    async fn consume(&self, handler: &dyn CommandHandler) -> Result<(), TransportError> {
        let consumer = self.consumer().await?;
        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| TransportError::Consume(e.to_string()))?;

        tracing::info!(
            consumer = %self.config.consumer,
            subject = %self.config.subject,
            "consuming saga commands"
        );

        while let Some(next) = messages.next().await {
            let message = match next {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "error receiving command");
                    continue;
                }
            };
            let delivered = message.info().map(|info| info.delivered).unwrap_or_default();

            let ack = match CommandEnvelope::from_slice(&message.payload) {
                Ok(envelope) => self.handle_in_progress(&message, handler, envelope).await,
                Err(e) => {
                    tracing::error!(error = %e, delivered, "undecodable command, terminating");
                    Acknowledgement::Reject
                }
            };

            metrics::counter!("nats_commands_consumed", "ack" => format!("{ack:?}")).increment(1);
            if let Err(e) = message.ack_with(ack_kind(ack)).await {
                // The server redelivers after ack_wait; the handler must
                // tolerate the duplicate.
                tracing::warn!(error = %e, ?ack, delivered, "failed to acknowledge command");
            }
        }

        tracing::info!(consumer = %self.config.consumer, "command stream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_maps_to_ack() {
        assert!(matches!(ack_kind(Acknowledgement::Ack), AckKind::Ack));
    }

    #[test]
    fn test_requeue_maps_to_nak_without_delay() {
        assert!(matches!(
            ack_kind(Acknowledgement::Requeue),
            AckKind::Nak(None)
        ));
    }

    #[test]
    fn test_reject_maps_to_term() {
        assert!(matches!(ack_kind(Acknowledgement::Reject), AckKind::Term));
    }

    #[test]
    fn test_progress_interval_is_half_ack_wait() {
        assert_eq!(
            progress_interval(Duration::from_secs(30)),
            Duration::from_secs(15)
        );
        assert_eq!(
            progress_interval(Duration::from_millis(50)),
            Duration::from_millis(100)
        );
        assert_eq!(progress_interval(Duration::ZERO), Duration::from_millis(100));
    }
}
