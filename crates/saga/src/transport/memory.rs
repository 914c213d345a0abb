//! In-memory command transport for tests and single-process use.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Acknowledgement, CommandHandler, CommandTransport};
use crate::envelope::CommandEnvelope;
use crate::error::TransportError;

/// Default number of deliveries before a requeued message is dead-lettered.
pub const DEFAULT_MAX_DELIVER: u32 = 5;

#[derive(Debug, Clone)]
struct QueuedMessage {
    body: Vec<u8>,
    deliveries: u32,
}

#[derive(Debug, Default)]
struct InMemoryTransportState {
    backlog: VecDeque<QueuedMessage>,
    published: Vec<CommandEnvelope>,
    dead_letters: Vec<Vec<u8>>,
    acknowledged: usize,
}

/// A FIFO queue holding JSON-encoded envelopes.
///
/// [`consume`](CommandTransport::consume) drains the backlog one message at
/// a time and returns once it is empty, which lets tests drive a saga to
/// its terminal state deterministically. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    state: Arc<Mutex<InMemoryTransportState>>,
    fail_on_publish: Arc<AtomicBool>,
    max_deliver: u32,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_max_deliver(DEFAULT_MAX_DELIVER)
    }

    /// Creates a transport that dead-letters a message after `max_deliver`
    /// requeued deliveries.
    pub fn with_max_deliver(max_deliver: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryTransportState::default())),
            fail_on_publish: Arc::new(AtomicBool::new(false)),
            max_deliver: max_deliver.max(1),
        }
    }

    /// Simulates a broker outage for publishes.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Enqueues a raw message body without recording it as published.
    pub async fn enqueue_raw(&self, body: impl Into<Vec<u8>>) {
        self.state.lock().await.backlog.push_back(QueuedMessage {
            body: body.into(),
            deliveries: 0,
        });
    }

    /// Enqueues an envelope without recording it as published, e.g. to
    /// simulate a redelivery.
    pub async fn enqueue(&self, envelope: &CommandEnvelope) -> Result<(), TransportError> {
        self.enqueue_raw(envelope.to_bytes()?).await;
        Ok(())
    }

    /// Every envelope published so far, in order.
    pub async fn published(&self) -> Vec<CommandEnvelope> {
        self.state.lock().await.published.clone()
    }

    pub async fn backlog_len(&self) -> usize {
        self.state.lock().await.backlog.len()
    }

    /// Bodies of messages that were rejected or exhausted their deliveries.
    pub async fn dead_letters(&self) -> Vec<Vec<u8>> {
        self.state.lock().await.dead_letters.clone()
    }

    pub async fn acknowledged(&self) -> usize {
        self.state.lock().await.acknowledged
    }
}

#[async_trait]
impl CommandTransport for InMemoryTransport {
    async fn publish(&self, envelope: &CommandEnvelope) -> Result<(), TransportError> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Publish("broker unavailable".to_string()));
        }
        let body = envelope.to_bytes()?;

        let mut state = self.state.lock().await;
        state.backlog.push_back(QueuedMessage {
            body,
            deliveries: 0,
        });
        state.published.push(envelope.clone());
        Ok(())
    }

    async fn consume(&self, handler: &dyn CommandHandler) -> Result<(), TransportError> {
        loop {
            let next = self.state.lock().await.backlog.pop_front();
            let Some(mut message) = next else {
                return Ok(());
            };
            message.deliveries += 1;

            let envelope = match CommandEnvelope::from_slice(&message.body) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed command");
                    self.state.lock().await.dead_letters.push(message.body);
                    continue;
                }
            };

            let ack = handler.handle(envelope).await;

            let mut state = self.state.lock().await;
            match ack {
                Acknowledgement::Ack => state.acknowledged += 1,
                Acknowledgement::Reject => state.dead_letters.push(message.body),
                Acknowledgement::Requeue if message.deliveries >= self.max_deliver => {
                    tracing::warn!(
                        deliveries = message.deliveries,
                        "command exhausted its deliveries"
                    );
                    state.dead_letters.push(message.body);
                }
                Acknowledgement::Requeue => state.backlog.push_back(message),
            }
        }
    }
}
