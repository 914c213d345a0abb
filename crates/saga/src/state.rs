//! Saga state machine.

use serde::{Deserialize, Serialize};
use state_store::TransitionKind;

/// The state of a saga instance.
///
/// The controller never stores this; it is implied by the last processed
/// command and observable through the recorded transitions.
///
/// State transitions:
/// ```text
/// Running ──┬──► Completed
///           ├──► Failed            (compensation unwound to the head)
///           └──► CompensateFailed  (a compensation itself failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Actions or compensations are still being driven.
    #[default]
    Running,

    /// All actions succeeded (terminal state).
    Completed,

    /// Every step back to the head was compensated (terminal state).
    Failed,

    /// The rollback chain halted on a failing compensation (terminal state).
    CompensateFailed,
}

impl SagaState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SagaState::Running)
    }

    /// Returns the terminal state a transition leads to, if any.
    pub fn after(transition: TransitionKind) -> Option<SagaState> {
        match transition {
            TransitionKind::SagaCompleted => Some(SagaState::Completed),
            TransitionKind::SagaFailed => Some(SagaState::Failed),
            TransitionKind::SagaCompensateFailed => Some(SagaState::CompensateFailed),
            _ => None,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Running => "Running",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
            SagaState::CompensateFailed => "CompensateFailed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_running() {
        assert_eq!(SagaState::default(), SagaState::Running);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SagaState::Running.is_terminal());
        assert!(SagaState::Completed.is_terminal());
        assert!(SagaState::Failed.is_terminal());
        assert!(SagaState::CompensateFailed.is_terminal());
    }

    #[test]
    fn test_after_transition() {
        assert_eq!(
            SagaState::after(TransitionKind::SagaCompleted),
            Some(SagaState::Completed)
        );
        assert_eq!(
            SagaState::after(TransitionKind::SagaFailed),
            Some(SagaState::Failed)
        );
        assert_eq!(
            SagaState::after(TransitionKind::SagaCompensateFailed),
            Some(SagaState::CompensateFailed)
        );
        assert_eq!(SagaState::after(TransitionKind::ActionFailed), None);
        assert_eq!(SagaState::after(TransitionKind::CompensationFailed), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaState::Running.to_string(), "Running");
        assert_eq!(SagaState::Completed.to_string(), "Completed");
        assert_eq!(SagaState::Failed.to_string(), "Failed");
        assert_eq!(SagaState::CompensateFailed.to_string(), "CompensateFailed");
    }
}
