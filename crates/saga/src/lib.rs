//! Saga execution controller.
//!
//! A saga is an ordered chain of steps, each with a forward action and a
//! compensating action. Progress is driven entirely by command messages:
//! the controller consumes one command, runs the targeted callable, records
//! the transition and publishes the next command.
//!
//! - An action that succeeds moves the saga to the next step's action; the
//!   last step completing ends the saga.
//! - An action that fails triggers the compensation of that same step, then
//!   of every earlier step in reverse order, ending in a failed saga.
//! - A compensation that fails halts the rollback; the saga is left for an
//!   operator.
//!
//! The controller holds no per-instance state. Recovery after a crash relies
//! solely on the transport redelivering unacknowledged commands.

pub mod controller;
pub mod definition;
pub mod envelope;
pub mod error;
pub mod progress;
pub mod registry;
pub mod state;
pub mod step;
pub mod transport;

pub use controller::{ControllerConfig, Outcome, SagaExecutionController};
pub use definition::SagaDefinition;
pub use envelope::{CommandEnvelope, Direction, Failure, Payload};
pub use error::{Result, SagaError, TransportError};
pub use progress::SagaProgress;
pub use registry::SagaRegistry;
pub use state::SagaState;
pub use step::{FnStep, Step, StepAction, StepError, StepInput, from_fn};
pub use transport::{Acknowledgement, CommandHandler, CommandTransport, InMemoryTransport};

pub use common::SagaId;
