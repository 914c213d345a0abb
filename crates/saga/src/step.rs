//! Saga steps and the callables they run.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use common::SagaId;
use thiserror::Error;

use crate::envelope::{CommandEnvelope, Failure, Payload};

/// What a step callable receives.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub saga_id: SagaId,
    pub saga_name: String,
    pub step_name: String,
    pub payload: Payload,
    /// The failure being compensated. Always `None` for actions.
    pub failure: Option<Failure>,
}

impl StepInput {
    pub(crate) fn from_envelope(envelope: &CommandEnvelope) -> Self {
        Self {
            saga_id: envelope.saga_id.clone(),
            saga_name: envelope.saga_name.clone(),
            step_name: envelope.step_name.clone(),
            payload: envelope.payload.clone(),
            failure: envelope.failure(),
        }
    }
}

/// A business failure returned by a step callable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StepError {
    /// Error category.
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

impl StepError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Wraps an arbitrary error, using its type name as the kind.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        Self {
            kind: short_type_name::<E>().to_string(),
            message: error.to_string(),
        }
    }

    pub fn into_failure(self) -> Failure {
        Failure::new(self.kind, self.message)
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// The capability a step's action or compensation provides.
///
/// Implementations must be idempotent: a command may be delivered more than
/// once after a crash before acknowledgement. A callable that delegates to a
/// remote service may return as soon as that service accepted the request.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, input: StepInput) -> Result<Payload, StepError>;
}

#[async_trait]
impl<T: StepAction + ?Sized> StepAction for Arc<T> {
    async fn run(&self, input: StepInput) -> Result<Payload, StepError> {
        (**self).run(input).await
    }
}

/// A [`StepAction`] backed by an async closure. See [`from_fn`].
pub struct FnStep<F>(F);

/// Adapts an async closure into a [`StepAction`].
///
/// ```ignore
/// let action = from_fn(|input: StepInput| async move { Ok(input.payload) });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnStep<F>
where
    F: Fn(StepInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, StepError>> + Send + 'static,
{
    FnStep(f)
}

#[async_trait]
impl<F, Fut> StepAction for FnStep<F>
where
    F: Fn(StepInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, StepError>> + Send + 'static,
{
    async fn run(&self, input: StepInput) -> Result<Payload, StepError> {
        (self.0)(input).await
    }
}

/// A named step with its forward action and its compensation.
///
/// `previous`/`next` are positions inside the owning saga definition and are
/// assigned when the step is added to it.
#[derive(Clone)]
pub struct Step {
    name: String,
    action: Arc<dyn StepAction>,
    compensation: Arc<dyn StepAction>,
    pub(crate) position: usize,
    pub(crate) previous: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        action: impl StepAction + 'static,
        compensation: impl StepAction + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            action: Arc::new(action),
            compensation: Arc::new(compensation),
            position: 0,
            previous: None,
            next: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &dyn StepAction {
        self.action.as_ref()
    }

    pub fn compensation(&self) -> &dyn StepAction {
        self.compensation.as_ref()
    }

    /// Zero-based position in the saga.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_head(&self) -> bool {
        self.previous.is_none()
    }

    pub fn is_tail(&self) -> bool {
        self.next.is_none()
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("previous", &self.previous)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}
