//! Operator view of a saga instance, rebuilt from its recorded transitions.

use common::SagaId;
use serde::{Deserialize, Serialize};
use state_store::{TransitionKind, TransitionRecord};

use crate::state::SagaState;

/// Where a saga instance stands according to the state repository.
///
/// Purely observational: the controller never consults it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SagaProgress {
    saga_id: Option<SagaId>,
    state: SagaState,
    completed_steps: Vec<String>,
    compensated_steps: Vec<String>,
    /// Step whose action failed.
    failed_step: Option<String>,
    /// Step whose compensation failed.
    stuck_step: Option<String>,
    error_kind: Option<String>,
    error_message: Option<String>,
}

impl SagaProgress {
    /// Folds records of one saga instance, oldest first.
    pub fn replay<'a>(records: impl IntoIterator<Item = &'a TransitionRecord>) -> Self {
        let mut progress = Self::default();
        for record in records {
            progress.apply(record);
        }
        progress
    }

    pub fn apply(&mut self, record: &TransitionRecord) {
        if self.saga_id.is_none() {
            self.saga_id = Some(record.saga_id.clone());
        }
        let step = record.step_name.clone();

        match record.transition {
            TransitionKind::ActionStarted | TransitionKind::CompensationStarted => {}
            TransitionKind::ActionSucceeded => {
                if let Some(step) = step {
                    self.completed_steps.push(step);
                }
            }
            TransitionKind::ActionFailed => {
                self.failed_step = step;
                self.error_kind = record.error_kind.clone();
                self.error_message = record.error_message.clone();
            }
            TransitionKind::CompensationSucceeded => {
                if let Some(step) = step {
                    self.compensated_steps.push(step);
                }
            }
            TransitionKind::CompensationFailed => {
                self.stuck_step = step;
            }
            TransitionKind::SagaFailed => {
                if self.error_kind.is_none() {
                    self.error_kind = record.error_kind.clone();
                    self.error_message = record.error_message.clone();
                }
            }
            TransitionKind::SagaCompleted => {}
            TransitionKind::SagaCompensateFailed => {
                self.stuck_step = step;
            }
        }

        if let Some(state) = SagaState::after(record.transition) {
            self.state = state;
        }
    }

    pub fn saga_id(&self) -> Option<&SagaId> {
        self.saga_id.as_ref()
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Steps whose action succeeded, in order.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Steps whose compensation succeeded, in order.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    pub fn stuck_step(&self) -> Option<&str> {
        self.stuck_step.as_deref()
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.error_kind.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}
