//! # Fibonacci Demo - Core Library Crate
//!
//! Two cooperating processes demonstrating end-to-end distributed tracing:
//! an HTTP service that computes Fibonacci numbers (`fibonacci-service`) and
//! a client that continuously exercises it with randomized input
//! (`load-generator`). Every log record emitted by either process is routed
//! through a trace-aware enricher so logs and traces can be correlated by
//! trace and span identifiers.
//!
//! ## Architecture Overview
//!
//! - `core`: error types and environment-based configuration
//! - `fibonacci`: the bounded computation and its wire types
//! - `observability`: structured logging, trace-context propagation, and
//!   telemetry pipeline construction
//! - `service`: the axum server exposing `POST /compute`
//! - `client`: the compute client and the load generator loop

/// Error types and configuration loading shared by both binaries
pub mod core;

/// Bounded Fibonacci computation plus the `POST /compute` wire contract
pub mod fibonacci;

/// Structured logging, trace propagation, and telemetry pipeline setup
pub mod observability;

/// HTTP service exposing the computation
pub mod service;

/// HTTP client and load generator loop
pub mod client;

// Re-export the types the binaries wire together at startup.
pub use crate::client::{ComputeClient, LoadGenerator};
pub use crate::core::config::Config;
pub use crate::core::error::{AppError, AppResult};
pub use crate::observability::logging::{
    JsonSink, LogLevel, LogRecord, LogSink, Logger, TraceEnricher,
};
pub use crate::observability::telemetry::{init_telemetry, TelemetryGuard};
pub use crate::service::server::{build_router, serve, AppState};
