//! Saga worker entry point.

use anyhow::Context;
use tokio::signal;
use transport_nats::NatsTransport;
use worker::{Config, telemetry};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("failed to install SIGINT handler")?;
                tracing::info!("received SIGINT, shutting down");
            }
            _ = terminate.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("failed to install SIGINT handler")?;
        tracing::info!("received SIGINT, shutting down");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration and tracing
    let config = Config::from_env()?;
    telemetry::init_tracing(config.log_format);

    // 2. Prometheus exporter
    if let Some(addr) = config.metrics_addr() {
        telemetry::install_metrics(addr).context("failed to install Prometheus exporter")?;
    }

    // 3. Broker, repository and controller
    let transport = NatsTransport::connect(config.transport.clone())
        .await
        .context("failed to connect to NATS")?;
    let registry = worker::demo::registry()?;
    let controller = worker::build_controller(&config, registry, transport)
        .await
        .context("failed to open state repository")?;

    tracing::info!(
        stream = %config.transport.stream,
        consumer = %config.transport.consumer,
        repository = controller.repository().name(),
        strict_audit = config.strict_audit,
        "saga worker started"
    );

    // 4. Consume until the stream closes or a signal arrives. An in-flight
    // command left unacknowledged is redelivered to the next worker.
    tokio::select! {
        result = controller.run() => result.context("saga controller stopped")?,
        result = shutdown_signal() => result?,
    }

    tracing::info!("saga worker shut down");
    Ok(())
}
