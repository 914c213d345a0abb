//! Saga worker process.
//!
//! Wires the saga execution controller to a NATS JetStream queue and a
//! state repository chosen through environment variables.

pub mod config;
pub mod demo;
pub mod repository;
pub mod telemetry;

use std::sync::Arc;

use saga::{ControllerConfig, SagaExecutionController, SagaRegistry};
use transport_nats::NatsTransport;

pub use config::{Config, ConfigError, LogFormat, RepositoryBackend};
pub use repository::Repository;

/// The controller as deployed by `saga-worker`.
pub type WorkerController = SagaExecutionController<Repository, NatsTransport>;

/// Builds the controller for `config` around an already connected transport.
pub async fn build_controller(
    config: &Config,
    registry: SagaRegistry,
    transport: NatsTransport,
) -> Result<WorkerController, state_store::StateStoreError> {
    let repository = Repository::open(&config.repository).await?;
    Ok(SagaExecutionController::new(
        Arc::new(registry),
        repository,
        transport,
        ControllerConfig {
            strict_audit: config.strict_audit,
        },
    ))
}
