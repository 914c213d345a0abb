//! Saga execution controller.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::SagaId;
use state_store::{StateRepository, StateRepositoryExt, StateStoreError, TransitionKind};

use crate::definition::SagaDefinition;
use crate::envelope::{CommandEnvelope, Direction, Payload};
use crate::error::{Result, SagaError};
use crate::registry::SagaRegistry;
use crate::state::SagaState;
use crate::step::{Step, StepInput};
use crate::transport::{Acknowledgement, CommandHandler, CommandTransport};

/// Controller settings, passed in at construction.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// When set, a failed repository write aborts handling before anything
    /// is published, so the command is redelivered. Otherwise the failure is
    /// logged and counted and the saga proceeds.
    pub strict_audit: bool,
}

/// Result of handling one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// State of the saga instance after this hop.
    pub state: SagaState,
    /// The command published for the next hop, if any.
    pub emitted: Option<CommandEnvelope>,
    /// Repository writes that failed without aborting the hop.
    pub audit_failures: usize,
}

impl Outcome {
    fn running(emitted: CommandEnvelope, audit_failures: usize) -> Self {
        Self {
            state: SagaState::Running,
            emitted: Some(emitted),
            audit_failures,
        }
    }

    fn terminal(state: SagaState, audit_failures: usize) -> Self {
        Self {
            state,
            emitted: None,
            audit_failures,
        }
    }
}

/// Drives saga instances one command at a time.
///
/// The controller keeps no per-instance state: everything it needs is in
/// the inbound envelope and the immutable registry. One controller can be
/// shared by concurrent workers.
pub struct SagaExecutionController<R, T>
where
    R: StateRepository,
    T: CommandTransport,
{
    registry: Arc<SagaRegistry>,
    repository: R,
    transport: T,
    config: ControllerConfig,
}

impl<R, T> SagaExecutionController<R, T>
where
    R: StateRepository,
    T: CommandTransport,
{
    pub fn new(
        registry: Arc<SagaRegistry>,
        repository: R,
        transport: T,
        config: ControllerConfig,
    ) -> Self {
        Self {
            registry,
            repository,
            transport,
            config,
        }
    }

    pub fn registry(&self) -> &SagaRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Starts a new saga instance by publishing the action command for the
    /// saga's first step. Returns the new instance's id.
    #[tracing::instrument(skip(self, payload))]
    pub async fn start(&self, saga_name: &str, payload: Payload) -> Result<SagaId> {
        let saga = self.registry.get_saga(saga_name)?;
        let first = saga.first_step()?;

        let saga_id = SagaId::new();
        let command = CommandEnvelope::initial(saga_id.clone(), saga.name(), first.name(), payload);
        self.transport.publish(&command).await?;

        metrics::counter!("saga_started").increment(1);
        tracing::info!(%saga_id, step = first.name(), "saga started");
        Ok(saga_id)
    }

    /// Consumes commands from the transport until it stops.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(sagas = ?self.registry.saga_names(), "saga controller consuming");
        self.transport.consume(self).await?;
        Ok(())
    }

    /// Handles one inbound command: resolves saga and step, runs the
    /// requested callable, records the transitions and publishes the next
    /// command, if any.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            saga_id = %envelope.saga_id,
            saga_name = %envelope.saga_name,
            step = %envelope.step_name,
            direction = %envelope.direction,
        )
    )]
    pub async fn handle_command(&self, envelope: CommandEnvelope) -> Result<Outcome> {
        let saga = self.registry.get_saga(&envelope.saga_name)?;
        let step = saga.get_step(&envelope.step_name)?;

        match &envelope.direction {
            Direction::Action => {
                metrics::counter!("saga_commands_total", "direction" => "action").increment(1);
                self.run_action(saga, step, &envelope).await
            }
            Direction::Compensation => {
                metrics::counter!("saga_commands_total", "direction" => "compensation")
                    .increment(1);
                self.run_compensation(saga, step, &envelope).await
            }
            Direction::Unknown(other) => Err(SagaError::UnknownDirection {
                saga_id: envelope.saga_id.clone(),
                direction: other.clone(),
            }),
        }
    }

    async fn run_action(
        &self,
        saga: &SagaDefinition,
        step: &Step,
        envelope: &CommandEnvelope,
    ) -> Result<Outcome> {
        let saga_id = &envelope.saga_id;
        let mut audit_failures = 0;

        let recorded = self.repository.action_started(saga_id, step.name()).await;
        self.audit(&mut audit_failures, TransitionKind::ActionStarted, recorded)?;

        let started = Instant::now();
        let result = step.action().run(StepInput::from_envelope(envelope)).await;
        metrics::histogram!("saga_step_duration_seconds", "direction" => "action")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(payload) => {
                let recorded = self.repository.action_succeeded(saga_id, step.name()).await;
                self.audit(&mut audit_failures, TransitionKind::ActionSucceeded, recorded)?;

                match saga.next_step(step) {
                    Some(next) => {
                        let command = envelope.next_action(next.name(), payload);
                        self.transport.publish(&command).await?;
                        tracing::debug!(next_step = next.name(), "next action emitted");
                        Ok(Outcome::running(command, audit_failures))
                    }
                    None => {
                        let recorded = self.repository.saga_completed(saga_id).await;
                        self.audit(&mut audit_failures, TransitionKind::SagaCompleted, recorded)?;

                        metrics::counter!("saga_completed").increment(1);
                        tracing::info!("saga completed");
                        Ok(Outcome::terminal(SagaState::Completed, audit_failures))
                    }
                }
            }
            Err(error) => {
                tracing::warn!(
                    error_kind = %error.kind,
                    error_message = %error.message,
                    "step action failed, compensating"
                );
                let recorded = self
                    .repository
                    .action_failed(saga_id, step.name(), &error.kind, &error.message)
                    .await;
                self.audit(&mut audit_failures, TransitionKind::ActionFailed, recorded)?;

                // The failed step itself is compensated first: its action may
                // have left partial side effects behind.
                let command = envelope.compensation(
                    step.name(),
                    envelope.payload.clone(),
                    Some(error.into_failure()),
                );
                self.transport.publish(&command).await?;
                Ok(Outcome::running(command, audit_failures))
            }
        }
    }

    async fn run_compensation(
        &self,
        saga: &SagaDefinition,
        step: &Step,
        envelope: &CommandEnvelope,
    ) -> Result<Outcome> {
        let saga_id = &envelope.saga_id;
        let mut audit_failures = 0;

        let recorded = self
            .repository
            .compensation_started(saga_id, step.name())
            .await;
        self.audit(&mut audit_failures, TransitionKind::CompensationStarted, recorded)?;

        let started = Instant::now();
        let result = step
            .compensation()
            .run(StepInput::from_envelope(envelope))
            .await;
        metrics::histogram!("saga_step_duration_seconds", "direction" => "compensation")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(payload) => {
                let recorded = self
                    .repository
                    .compensation_succeeded(saga_id, step.name())
                    .await;
                self.audit(
                    &mut audit_failures,
                    TransitionKind::CompensationSucceeded,
                    recorded,
                )?;

                match saga.previous_step(step) {
                    Some(previous) => {
                        let command = envelope.continue_compensation(previous.name(), payload);
                        self.transport.publish(&command).await?;
                        tracing::debug!(previous_step = previous.name(), "compensation emitted");
                        Ok(Outcome::running(command, audit_failures))
                    }
                    None => {
                        let recorded = self
                            .repository
                            .saga_failed(
                                saga_id,
                                step.name(),
                                envelope.error_kind.as_deref(),
                                envelope.error_message.as_deref(),
                            )
                            .await;
                        self.audit(&mut audit_failures, TransitionKind::SagaFailed, recorded)?;

                        metrics::counter!("saga_failed").increment(1);
                        tracing::warn!(
                            error_kind = envelope.error_kind.as_deref().unwrap_or("unknown"),
                            "saga rolled back"
                        );
                        Ok(Outcome::terminal(SagaState::Failed, audit_failures))
                    }
                }
            }
            Err(error) => {
                let recorded = self
                    .repository
                    .compensation_failed(saga_id, step.name(), &error.kind, &error.message)
                    .await;
                self.audit(&mut audit_failures, TransitionKind::CompensationFailed, recorded)?;

                let recorded = self
                    .repository
                    .saga_compensate_failed(saga_id, step.name(), &error.kind, &error.message)
                    .await;
                self.audit(
                    &mut audit_failures,
                    TransitionKind::SagaCompensateFailed,
                    recorded,
                )?;

                metrics::counter!("saga_compensate_failed").increment(1);
                tracing::error!(
                    error_kind = %error.kind,
                    error_message = %error.message,
                    "compensation failed, saga needs operator intervention"
                );
                Ok(Outcome::terminal(SagaState::CompensateFailed, audit_failures))
            }
        }
    }

    fn audit(
        &self,
        audit_failures: &mut usize,
        transition: TransitionKind,
        recorded: std::result::Result<(), StateStoreError>,
    ) -> Result<()> {
        match recorded {
            Ok(()) => Ok(()),
            Err(e) if self.config.strict_audit => Err(SagaError::Repository(e)),
            Err(e) => {
                *audit_failures += 1;
                metrics::counter!("saga_audit_failures").increment(1);
                tracing::error!(error = %e, %transition, "failed to record saga transition");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<R, T> CommandHandler for SagaExecutionController<R, T>
where
    R: StateRepository,
    T: CommandTransport,
{
    async fn handle(&self, envelope: CommandEnvelope) -> Acknowledgement {
        match self.handle_command(envelope).await {
            Ok(_) => Acknowledgement::Ack,
            Err(e) if e.is_infrastructure() => {
                tracing::warn!(error = %e, "infrastructure failure, command will be redelivered");
                Acknowledgement::Requeue
            }
            Err(e) => {
                let reason = if e.is_configuration() {
                    "configuration"
                } else {
                    "malformed"
                };
                metrics::counter!("saga_commands_rejected", "reason" => reason).increment(1);
                tracing::error!(error = %e, reason, "rejecting saga command");
                Acknowledgement::Reject
            }
        }
    }
}
