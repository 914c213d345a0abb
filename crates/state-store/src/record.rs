//! Saga lifecycle transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SagaId;

/// One observable lifecycle event of a saga instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    ActionStarted,
    ActionSucceeded,
    ActionFailed,
    CompensationStarted,
    CompensationSucceeded,
    CompensationFailed,
    SagaCompleted,
    SagaFailed,
    SagaCompensateFailed,
}

impl TransitionKind {
    /// All transition kinds, in lifecycle order.
    pub const ALL: [TransitionKind; 9] = [
        TransitionKind::ActionStarted,
        TransitionKind::ActionSucceeded,
        TransitionKind::ActionFailed,
        TransitionKind::CompensationStarted,
        TransitionKind::CompensationSucceeded,
        TransitionKind::CompensationFailed,
        TransitionKind::SagaCompleted,
        TransitionKind::SagaFailed,
        TransitionKind::SagaCompensateFailed,
    ];

    /// Returns the wire name of the transition.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::ActionStarted => "action_started",
            TransitionKind::ActionSucceeded => "action_succeeded",
            TransitionKind::ActionFailed => "action_failed",
            TransitionKind::CompensationStarted => "compensation_started",
            TransitionKind::CompensationSucceeded => "compensation_succeeded",
            TransitionKind::CompensationFailed => "compensation_failed",
            TransitionKind::SagaCompleted => "saga_completed",
            TransitionKind::SagaFailed => "saga_failed",
            TransitionKind::SagaCompensateFailed => "saga_compensate_failed",
        }
    }

    /// Coarse phase of the saga instance once this transition is recorded.
    pub fn status(&self) -> &'static str {
        match self {
            TransitionKind::ActionStarted
            | TransitionKind::ActionSucceeded
            | TransitionKind::ActionFailed => "running",
            TransitionKind::CompensationStarted
            | TransitionKind::CompensationSucceeded
            | TransitionKind::CompensationFailed => "compensation",
            TransitionKind::SagaCompleted => "completed",
            TransitionKind::SagaFailed => "failed",
            TransitionKind::SagaCompensateFailed => "compensation_failed",
        }
    }

    /// Returns true if no further commands follow this transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransitionKind::SagaCompleted
                | TransitionKind::SagaFailed
                | TransitionKind::SagaCompensateFailed
        )
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransitionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TransitionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown transition kind '{s}'"))
    }
}

/// An append-only observation of a saga lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The saga instance this record belongs to.
    pub saga_id: SagaId,

    /// The step the transition happened on. `None` for `saga_completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,

    /// What happened.
    pub transition: TransitionKind,

    /// Category of the failure that drove the saga backwards, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Human-readable failure detail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When the record was produced.
    pub recorded_at: DateTime<Utc>,
}

impl TransitionRecord {
    /// Creates a record for a transition on a step.
    pub fn new(
        saga_id: SagaId,
        step_name: Option<String>,
        transition: TransitionKind,
    ) -> Self {
        Self {
            saga_id,
            step_name,
            transition,
            error_kind: None,
            error_message: None,
            recorded_at: Utc::now(),
        }
    }

    /// Attaches failure context to the record.
    pub fn with_error(
        mut self,
        error_kind: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        self.error_kind = error_kind;
        self.error_message = error_message;
        self
    }

    /// Returns the coarse phase of the saga (see [`TransitionKind::status`]).
    pub fn status(&self) -> &'static str {
        self.transition.status()
    }
}
