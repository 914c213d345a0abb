//! The saga served by `saga-worker`.
//!
//! `subscription` withdraws the plan price from an account, creates a
//! subscription and accepts it. Steps only log and pass the payload on.
//! A payload field `fail_at` naming a step makes that step's action fail,
//! and `fail_compensation_at` does the same for a compensation, so a
//! rollback can be exercised end to end.

use saga::{Payload, SagaDefinition, SagaError, SagaRegistry, Step, StepError, StepInput, from_fn};

pub const SUBSCRIPTION_SAGA: &str = "subscription";

pub const SUBSCRIPTION_STEPS: [&str; 3] = [
    "withdraw_account_balance",
    "create_subscription",
    "accept_subscription",
];

fn targets(payload: &Payload, field: &str, step: &str) -> bool {
    payload.get(field).and_then(|v| v.as_str()) == Some(step)
}

async fn action(input: StepInput) -> Result<Payload, StepError> {
    if targets(&input.payload, "fail_at", &input.step_name) {
        tracing::warn!(saga_id = %input.saga_id, step = %input.step_name, "action declined");
        return Err(StepError::new(
            "Declined",
            format!("{} declined", input.step_name),
        ));
    }
    tracing::info!(saga_id = %input.saga_id, step = %input.step_name, "action done");
    Ok(input.payload)
}

async fn compensation(input: StepInput) -> Result<Payload, StepError> {
    if targets(&input.payload, "fail_compensation_at", &input.step_name) {
        tracing::error!(saga_id = %input.saga_id, step = %input.step_name, "compensation failed");
        return Err(StepError::new(
            "RollbackError",
            format!("{} could not be undone", input.step_name),
        ));
    }
    tracing::info!(
        saga_id = %input.saga_id,
        step = %input.step_name,
        cause = input.failure.as_ref().map(|f| f.kind.as_str()).unwrap_or("unknown"),
        "compensation done"
    );
    Ok(input.payload)
}

pub fn subscription_saga() -> Result<SagaDefinition, SagaError> {
    let mut saga = SagaDefinition::new(SUBSCRIPTION_SAGA);
    for name in SUBSCRIPTION_STEPS {
        saga.add_step(Step::new(name, from_fn(action), from_fn(compensation)))?;
    }
    Ok(saga)
}

/// Registry with every saga this worker serves.
pub fn registry() -> Result<SagaRegistry, SagaError> {
    SagaRegistry::new().with_saga(subscription_saga()?)
}
