//! Publishes the first command of a new saga instance.
//!
//! Usage: `saga-ignite <saga-name> [json-payload]`

use std::sync::Arc;

use anyhow::{Context, bail};
use saga::{ControllerConfig, Payload, SagaExecutionController};
use state_store::InMemoryStateRepository;
use transport_nats::NatsTransport;
use worker::{Config, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init_tracing(config.log_format);

    let mut args = std::env::args().skip(1);
    let Some(saga_name) = args.next() else {
        bail!("usage: saga-ignite <saga-name> [json-payload]");
    };
    let payload: Payload = match args.next() {
        Some(raw) => serde_json::from_str(&raw).context("payload must be valid JSON")?,
        None => Payload::Object(Default::default()),
    };

    let transport = NatsTransport::connect(config.transport.clone())
        .await
        .context("failed to connect to NATS")?;

    // Starting a saga only publishes; nothing is recorded.
    let controller = SagaExecutionController::new(
        Arc::new(worker::demo::registry()?),
        InMemoryStateRepository::new(),
        transport,
        ControllerConfig::default(),
    );
    let saga_id = controller.start(&saga_name, payload).await?;

    println!("{saga_id}");
    Ok(())
}
