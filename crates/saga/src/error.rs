//! Saga error types.

use common::SagaId;
use state_store::StateStoreError;
use thiserror::Error;

/// Errors that can occur during saga definition and execution.
///
/// Business failures of step callables are not errors at this level: they
/// are normal outcomes that drive compensation (see [`crate::StepError`]).
#[derive(Debug, Error)]
pub enum SagaError {
    /// No saga with this name is registered.
    #[error("Saga '{0}' not found")]
    SagaNotFound(String),

    /// The saga has no step with this name.
    #[error("Step '{step_name}' not found in saga '{saga_name}'")]
    StepNotFound {
        saga_name: String,
        step_name: String,
    },

    /// A step with this name was already added to the saga.
    #[error("Step '{step_name}' already exists in saga '{saga_name}'")]
    DuplicateStepName {
        saga_name: String,
        step_name: String,
    },

    /// A saga with this name is already registered.
    #[error("Saga '{0}' is already registered")]
    DuplicateSagaName(String),

    /// The saga has no steps.
    #[error("Saga '{0}' has no steps")]
    EmptySaga(String),

    /// The command carried a direction other than action/compensation.
    #[error("[{saga_id}] Unknown direction '{direction}'")]
    UnknownDirection { saga_id: SagaId, direction: String },

    /// The state repository rejected a write.
    #[error("State repository error: {0}")]
    Repository(#[from] StateStoreError),

    /// The broker could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl SagaError {
    /// Returns true for integration mistakes that must never be retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SagaError::SagaNotFound(_)
                | SagaError::StepNotFound { .. }
                | SagaError::DuplicateStepName { .. }
                | SagaError::DuplicateSagaName(_)
                | SagaError::EmptySaga(_)
                | SagaError::UnknownDirection { .. }
        )
    }

    /// Returns true if the failure is in the broker or the repository and the
    /// command should stay unacknowledged for redelivery.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            SagaError::Repository(_) => true,
            SagaError::Transport(e) => !matches!(e, TransportError::Decode(_)),
            _ => false,
        }
    }
}

/// Errors raised by command transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not connect to, or set up, the broker.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The broker did not accept an outbound command.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Receiving from the broker failed.
    #[error("Consume failed: {0}")]
    Consume(String),

    /// Acknowledging a delivery failed.
    #[error("Acknowledgement failed: {0}")]
    Ack(String),

    /// A message body is not a valid command envelope.
    #[error("Malformed command: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_not_infrastructure() {
        let errors = [
            SagaError::SagaNotFound("s".into()),
            SagaError::StepNotFound {
                saga_name: "s".into(),
                step_name: "x".into(),
            },
            SagaError::EmptySaga("s".into()),
            SagaError::UnknownDirection {
                saga_id: SagaId::from("id"),
                direction: "sideways".into(),
            },
        ];
        for error in errors {
            assert!(error.is_configuration(), "{error}");
            assert!(!error.is_infrastructure(), "{error}");
        }
    }

    #[test]
    fn test_infrastructure_errors() {
        let repo = SagaError::Repository(StateStoreError::Unavailable("down".into()));
        assert!(repo.is_infrastructure());
        assert!(!repo.is_configuration());

        let publish = SagaError::Transport(TransportError::Publish("nack".into()));
        assert!(publish.is_infrastructure());
    }

    #[test]
    fn test_decode_error_is_not_retried() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = SagaError::Transport(TransportError::Decode(decode));
        assert!(!error.is_infrastructure());
    }

    #[test]
    fn test_unknown_direction_message_carries_saga_id() {
        let error = SagaError::UnknownDirection {
            saga_id: SagaId::from("abc"),
            direction: "sideways".into(),
        };
        assert_eq!(error.to_string(), "[abc] Unknown direction 'sideways'");
    }
}
