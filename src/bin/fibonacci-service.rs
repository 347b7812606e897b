//! # fibonacci-service - Main Entry Point
//!
//! Starts the compute HTTP service: loads configuration from the
//! environment, wires the enriched JSON logger, brings up the telemetry
//! pipeline, serves `POST /compute`, and drains in-flight requests within
//! the configured grace period on SIGINT/SIGTERM.

use std::sync::Arc;

use opentelemetry::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use fibonacci_demo::{
    init_telemetry, serve, AppError, AppResult, AppState, Config, JsonSink, Logger, TraceEnricher,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // Startup failed before (or without) a working logger pipeline.
        eprintln!("fibonacci-service failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = Config::from_env()?;
    let logger = build_logger(&config);
    let cx = Context::new();

    logger.info(&cx, "starting up");

    let telemetry = init_telemetry(&config)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let state = Arc::new(AppState::new(logger.clone()));
    let mut server = tokio::spawn(serve(config.rest_port, state, shutdown.clone()));

    tokio::select! {
        // Server exited on its own, e.g. the listener could not bind.
        result = &mut server => {
            flatten_server_result(result)?;
        }
        _ = shutdown.cancelled() => {
            logger.info(&cx, "shutdown signal received, draining in-flight requests");
            if tokio::time::timeout(config.shutdown_timeout, &mut server)
                .await
                .is_err()
            {
                server.abort();
                logger.warn(&cx, "shutdown grace period elapsed, forcing shutdown");
            }
        }
    }

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

fn flatten_server_result(
    result: Result<AppResult<()>, tokio::task::JoinError>,
) -> AppResult<()> {
    match result {
        Ok(server_result) => server_result,
        Err(join_err) => Err(AppError::internal(format!(
            "server task failed: {join_err}"
        ))),
    }
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
