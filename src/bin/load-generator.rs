//! # load-generator - Main Entry Point
//!
//! Continuously exercises the fibonacci-service with randomized input,
//! propagating trace context on every request so the service's spans attach
//! under this process's traces. Exits cleanly on SIGINT/SIGTERM without
//! aborting a request already in flight.

use std::sync::Arc;

use opentelemetry::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use fibonacci_demo::{
    init_telemetry, AppResult, ComputeClient, Config, JsonSink, LoadGenerator, Logger,
    TraceEnricher,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("load-generator failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = Config::from_env()?;
    let base_url = config.require_fibonacci_service_url()?.to_string();

    let logger = build_logger(&config);
    let cx = Context::new();

    logger.info(&cx, "starting up");

    let telemetry = init_telemetry(&config)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let generator = LoadGenerator::new(ComputeClient::new(&base_url), logger.clone());
    let loop_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { generator.run(shutdown).await }
    });

    shutdown.cancelled().await;
    // The loop observes the token at its next iteration boundary.
    let _ = loop_task.await;

    telemetry.shutdown()?;
    logger.info(&cx, "good bye");
    Ok(())
}

fn build_logger(config: &Config) -> Logger {
    Logger::new(Arc::new(TraceEnricher::new(
        JsonSink::stdout()
            .with_base_field("environment", config.environment.clone())
            .with_base_field("service_name", config.service_name.clone())
            .with_base_field("service_version", config.service_version.clone()),
    )))
}

/// Cancel the token on SIGINT or SIGTERM.
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("Failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }

    shutdown.cancel();
}
