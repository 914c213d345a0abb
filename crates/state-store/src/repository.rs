use async_trait::async_trait;

use crate::{Result, SagaId, TransitionKind, TransitionRecord};

/// Core trait for state repository implementations.
///
/// A state repository is a write-only audit sink. Implementations must be
/// thread-safe (Send + Sync) and must persist records in the order they
/// are received for a given saga instance.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Appends a single transition record.
    async fn record(&self, record: TransitionRecord) -> Result<()>;
}

/// The nine lifecycle operations, expressed over [`StateRepository::record`].
#[async_trait]
pub trait StateRepositoryExt: StateRepository {
    async fn action_started(&self, saga_id: &SagaId, step_name: &str) -> Result<()> {
        self.record(step_record(saga_id, step_name, TransitionKind::ActionStarted))
            .await
    }

    async fn action_succeeded(&self, saga_id: &SagaId, step_name: &str) -> Result<()> {
        self.record(step_record(saga_id, step_name, TransitionKind::ActionSucceeded))
            .await
    }

    async fn action_failed(
        &self,
        saga_id: &SagaId,
        step_name: &str,
        error_kind: &str,
        error_message: &str,
    ) -> Result<()> {
        self.record(
            step_record(saga_id, step_name, TransitionKind::ActionFailed)
                .with_error(Some(error_kind.to_string()), Some(error_message.to_string())),
        )
        .await
    }

    async fn compensation_started(&self, saga_id: &SagaId, step_name: &str) -> Result<()> {
        self.record(step_record(
            saga_id,
            step_name,
            TransitionKind::CompensationStarted,
        ))
        .await
    }

    async fn compensation_succeeded(&self, saga_id: &SagaId, step_name: &str) -> Result<()> {
        self.record(step_record(
            saga_id,
            step_name,
            TransitionKind::CompensationSucceeded,
        ))
        .await
    }

    async fn compensation_failed(
        &self,
        saga_id: &SagaId,
        step_name: &str,
        error_kind: &str,
        error_message: &str,
    ) -> Result<()> {
        self.record(
            step_record(saga_id, step_name, TransitionKind::CompensationFailed)
                .with_error(Some(error_kind.to_string()), Some(error_message.to_string())),
        )
        .await
    }

    async fn saga_completed(&self, saga_id: &SagaId) -> Result<()> {
        self.record(TransitionRecord::new(
            saga_id.clone(),
            None,
            TransitionKind::SagaCompleted,
        ))
        .await
    }

    /// Records that compensation unwound to the head step. The error context
    /// is the one carried from the original action failure.
    async fn saga_failed(
        &self,
        saga_id: &SagaId,
        step_name: &str,
        error_kind: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.record(
            step_record(saga_id, step_name, TransitionKind::SagaFailed).with_error(
                error_kind.map(str::to_string),
                error_message.map(str::to_string),
            ),
        )
        .await
    }

    /// Records that the rollback chain is stuck at `step_name`. The error
    /// context is the compensation's own failure.
    async fn saga_compensate_failed(
        &self,
        saga_id: &SagaId,
        step_name: &str,
        error_kind: &str,
        error_message: &str,
    ) -> Result<()> {
        self.record(
            step_record(saga_id, step_name, TransitionKind::SagaCompensateFailed)
                .with_error(Some(error_kind.to_string()), Some(error_message.to_string())),
        )
        .await
    }
}

// Blanket implementation for all StateRepository implementations
impl<T: StateRepository + ?Sized> StateRepositoryExt for T {}

fn step_record(saga_id: &SagaId, step_name: &str, transition: TransitionKind) -> TransitionRecord {
    TransitionRecord::new(saga_id.clone(), Some(step_name.to_string()), transition)
}

#[async_trait]
impl<T: StateRepository + ?Sized> StateRepository for std::sync::Arc<T> {
    async fn record(&self, record: TransitionRecord) -> Result<()> {
        (**self).record(record).await
    }
}
