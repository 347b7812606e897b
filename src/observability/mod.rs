//! # Observability
//!
//! Structured logging with trace correlation, W3C trace-context propagation
//! helpers, and construction of the OTLP telemetry pipeline.

pub mod logging;
pub mod propagation;
pub mod telemetry;

pub use logging::{JsonSink, LogLevel, LogRecord, LogSink, Logger, TraceEnricher};
pub use propagation::{extract_context, HeaderExtractor, HeaderInjector};
pub use telemetry::{init_telemetry, TelemetryGuard};
