//! Command transport port.
//!
//! The controller is transport-agnostic: it publishes envelopes and hands
//! itself to [`CommandTransport::consume`] as a [`CommandHandler`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::envelope::CommandEnvelope;
use crate::error::TransportError;

pub use memory::InMemoryTransport;

/// What the transport should do with a delivery once it was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Handled (including business failures). Remove from the backlog.
    Ack,
    /// Infrastructure failure. Keep the message for redelivery.
    Requeue,
    /// The message can never succeed. Remove it without retrying.
    Reject,
}

/// Handles one inbound command at a time.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, envelope: CommandEnvelope) -> Acknowledgement;
}

/// Publish/consume interface over a message broker.
///
/// Transports deliver at least once and remove a message from the backlog
/// only after the handler returned [`Acknowledgement::Ack`] or
/// [`Acknowledgement::Reject`].
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Sends an envelope to the saga's queue.
    async fn publish(&self, envelope: &CommandEnvelope) -> Result<(), TransportError>;

    /// Feeds inbound envelopes to `handler`, one at a time.
    async fn consume(&self, handler: &dyn CommandHandler) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: CommandTransport + ?Sized> CommandTransport for Arc<T> {
    async fn publish(&self, envelope: &CommandEnvelope) -> Result<(), TransportError> {
        (**self).publish(envelope).await
    }

    async fn consume(&self, handler: &dyn CommandHandler) -> Result<(), TransportError> {
        (**self).consume(handler).await
    }
}
