use std::sync::Arc;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use saga::{
    CommandEnvelope, ControllerConfig, Direction, InMemoryTransport, SagaDefinition,
    SagaExecutionController, SagaId, SagaRegistry, Step, StepError, StepInput, from_fn,
};
use state_store::InMemoryStateRepository;

type BenchController = SagaExecutionController<InMemoryStateRepository, InMemoryTransport>;

fn passthrough(name: &str) -> Step {
    Step::new(
        name,
        from_fn(|input: StepInput| async move { Ok(input.payload) }),
        from_fn(|input: StepInput| async move { Ok(input.payload) }),
    )
}

fn make_controller(steps: usize, failing_last: bool) -> BenchController {
    let mut saga = SagaDefinition::new("bench");
    for i in 1..=steps {
        let name = format!("step{i}");
        if failing_last && i == steps {
            saga.add_step(Step::new(
                name,
                from_fn(|_| async move { Err(StepError::new("Declined", "bench failure")) }),
                from_fn(|input: StepInput| async move { Ok(input.payload) }),
            ))
            .unwrap();
        } else {
            saga.add_step(passthrough(&name)).unwrap();
        }
    }
    let registry = Arc::new(SagaRegistry::new().with_saga(saga).unwrap());
    SagaExecutionController::new(
        registry,
        InMemoryStateRepository::new(),
        InMemoryTransport::new(),
        ControllerConfig::default(),
    )
}

fn bench_handle_single_action(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let command = CommandEnvelope::initial(
        SagaId::from("bench-1"),
        "bench",
        "step1",
        serde_json::json!({"amount": 10}),
    );

    // A fresh controller per iteration keeps the queue and record list empty.
    c.bench_function("controller/handle_single_action", |b| {
        b.iter_batched(
            || (make_controller(3, false), command.clone()),
            |(controller, command)| {
                rt.block_on(async {
                    controller.handle_command(command).await.unwrap();
                });
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_happy_path_5_steps(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("controller/happy_path_5_steps", |b| {
        b.iter(|| {
            rt.block_on(async {
                let controller = make_controller(5, false);
                controller
                    .start("bench", serde_json::json!({"amount": 10}))
                    .await
                    .unwrap();
                controller.run().await.unwrap();
            });
        });
    });
}

fn bench_rollback_5_steps(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("controller/rollback_5_steps", |b| {
        b.iter(|| {
            rt.block_on(async {
                let controller = make_controller(5, true);
                controller
                    .start("bench", serde_json::json!({"amount": 10}))
                    .await
                    .unwrap();
                controller.run().await.unwrap();
            });
        });
    });
}

fn bench_envelope_decode(c: &mut Criterion) {
    let mut envelope = CommandEnvelope::initial(
        SagaId::new(),
        "bench",
        "step3",
        serde_json::json!({"order": {"items": [1, 2, 3], "total": 42.5}}),
    );
    envelope.direction = Direction::Compensation;
    envelope.error_kind = Some("Declined".into());
    envelope.error_message = Some("insufficient funds".into());
    let bytes = envelope.to_bytes().unwrap();

    c.bench_function("envelope/decode", |b| {
        b.iter(|| CommandEnvelope::from_slice(&bytes).unwrap());
    });
}

criterion_group!(
    benches,
    bench_handle_single_action,
    bench_happy_path_5_steps,
    bench_rollback_5_steps,
    bench_envelope_decode
);
criterion_main!(benches);
