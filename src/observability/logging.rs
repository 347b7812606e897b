//! # Structured Logging with Trace Correlation
//!
//! This module provides the structured logging used by both binaries and the
//! trace-aware enricher that correlates log records with the active span.
//!
//! ## Key Features
//! - Single-method [`LogSink`] abstraction so sinks can decorate each other
//! - [`TraceEnricher`]: appends `traceId` / `spanId` fields from the active
//!   OpenTelemetry context before delegating to the wrapped sink
//! - [`JsonSink`]: single-line JSON output with process-wide base fields
//!   (environment, service name, service version)
//! - [`Logger`]: a cheap-to-clone handle injected into every component, so
//!   nothing in the crate logs through an ambient global
//!
//! The enricher never buffers, drops, or reorders records. A context without
//! an active span is not an error; the record passes through unchanged.

use std::io::Write;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use opentelemetry::Context;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

/// Field name the enricher uses for the trace identifier
pub const TRACE_ID_FIELD: &str = "traceId";

/// Field name the enricher uses for the span identifier
pub const SPAN_ID_FIELD: &str = "spanId";

/// Errors that can occur while emitting a log record
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write log record: {0}")]
    Io(#[from] std::io::Error),
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// A leveled message plus ordered structured fields.
///
/// Records are mutated at most once (by the enricher) between construction
/// and emission; sinks treat them as immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: Vec<(String, Value)>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, builder-style.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_field(key, value);
        self
    }

    /// Append a field in place.
    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((key.into(), value.into()));
    }
}

/// A destination for log records.
///
/// The single-method contract lets sinks wrap other sinks (decorator style)
/// without any inheritance machinery; the enricher is one such wrapper and
/// can itself be wrapped again.
pub trait LogSink: Send + Sync {
    fn handle(&self, cx: &Context, record: LogRecord) -> Result<(), LoggingError>;
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn handle(&self, cx: &Context, record: LogRecord) -> Result<(), LoggingError> {
        (**self).handle(cx, record)
    }
}

/// Decorates a sink with trace-correlation fields.
///
/// When the context carries a valid trace identifier, `traceId` is appended
/// to the record; likewise `spanId` for a valid span identifier. The
/// possibly-modified record is then forwarded to the wrapped sink.
pub struct TraceEnricher<S> {
    inner: S,
}

impl<S: LogSink> TraceEnricher<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: LogSink> LogSink for TraceEnricher<S> {
    fn handle(&self, cx: &Context, mut record: LogRecord) -> Result<(), LoggingError> {
        let span = cx.span();
        let span_context = span.span_context();

        if span_context.trace_id() != TraceId::INVALID {
            record.add_field(TRACE_ID_FIELD, span_context.trace_id().to_string());
        }

        if span_context.span_id() != SpanId::INVALID {
            record.add_field(SPAN_ID_FIELD, span_context.span_id().to_string());
        }

        self.inner.handle(cx, record)
    }
}

/// Writes records as single-line JSON objects.
///
/// Base fields are appended to every record before its own fields,
/// mirroring how a process stamps environment and service identity onto all
/// of its output once at startup.
pub struct JsonSink<W: Write + Send> {
    writer: Mutex<W>,
    base_fields: Vec<(String, Value)>,
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            base_fields: Vec::new(),
        }
    }

    /// Stamp a field onto every record emitted through this sink.
    pub fn with_base_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.base_fields.push((key.into(), value.into()));
        self
    }
}

impl<W: Write + Send> LogSink for JsonSink<W> {
    fn handle(&self, _cx: &Context, record: LogRecord) -> Result<(), LoggingError> {
        let mut object = serde_json::Map::new();
        object.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        object.insert("level".to_string(), Value::String(record.level.to_string()));
        object.insert("message".to_string(), Value::String(record.message));

        for (key, value) in &self.base_fields {
            object.insert(key.clone(), value.clone());
        }
        for (key, value) in record.fields {
            object.insert(key, value);
        }

        let mut line = serde_json::to_vec(&Value::Object(object))?;
        line.push(b'\n');

        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Handle through which all components log.
///
/// Constructed once at startup around the enricher-wrapped sink and passed
/// to every component that logs. Sink failures are swallowed; logging must
/// never take the process down.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn log(&self, cx: &Context, record: LogRecord) {
        let _ = self.sink.handle(cx, record);
    }

    pub fn info(&self, cx: &Context, message: &str) {
        self.log(cx, LogRecord::new(LogLevel::Info, message));
    }

    pub fn warn(&self, cx: &Context, message: &str) {
        self.log(cx, LogRecord::new(LogLevel::Warn, message));
    }

    pub fn error(&self, cx: &Context, message: &str) {
        self.log(cx, LogRecord::new(LogLevel::Error, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanContext, TraceFlags, TraceState};
    use serde_json::json;

    const TRACE_ID_HEX: &str = "0af7651916cd43dd8448eb211c80319c";
    const SPAN_ID_HEX: &str = "b7ad6b7169203331";

    #[derive(Default)]
    struct CapturingSink {
        records: Mutex<Vec<LogRecord>>,
    }

    impl CapturingSink {
        fn records(&self) -> Vec<LogRecord> {
            self.records.lock().clone()
        }
    }

    impl LogSink for CapturingSink {
        fn handle(&self, _cx: &Context, record: LogRecord) -> Result<(), LoggingError> {
            self.records.lock().push(record);
            Ok(())
        }
    }

    fn context_with_ids() -> Context {
        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID_HEX).unwrap(),
            SpanId::from_hex(SPAN_ID_HEX).unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn test_enricher_appends_trace_fields() {
        let captured = Arc::new(CapturingSink::default());
        let enricher = TraceEnricher::new(captured.clone());

        let record = LogRecord::new(LogLevel::Info, "calculated fibonacci")
            .with_field("n", 10)
            .with_field("fib", 55);
        enricher.handle(&context_with_ids(), record).unwrap();

        let records = captured.records();
        assert_eq!(records.len(), 1);
        let fields = &records[0].fields;

        // Original fields preserved, in order, ahead of the appended ones.
        assert_eq!(fields[0], ("n".to_string(), json!(10)));
        assert_eq!(fields[1], ("fib".to_string(), json!(55)));
        assert_eq!(
            fields[2],
            (TRACE_ID_FIELD.to_string(), json!(TRACE_ID_HEX))
        );
        assert_eq!(fields[3], (SPAN_ID_FIELD.to_string(), json!(SPAN_ID_HEX)));
    }

    #[test]
    fn test_enricher_passes_record_through_without_span() {
        let captured = Arc::new(CapturingSink::default());
        let enricher = TraceEnricher::new(captured.clone());

        let record = LogRecord::new(LogLevel::Info, "starting up").with_field("port", 8080);
        enricher.handle(&Context::new(), record.clone()).unwrap();

        let records = captured.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], record);
    }

    #[test]
    fn test_enricher_nests() {
        let captured = Arc::new(CapturingSink::default());
        let enricher = TraceEnricher::new(TraceEnricher::new(captured.clone()));

        enricher
            .handle(
                &context_with_ids(),
                LogRecord::new(LogLevel::Info, "nested"),
            )
            .unwrap();

        // Both layers ran; the record reached the sink exactly once.
        let records = captured.records();
        assert_eq!(records.len(), 1);
        let trace_fields = records[0]
            .fields
            .iter()
            .filter(|(key, _)| key == TRACE_ID_FIELD)
            .count();
        assert_eq!(trace_fields, 2);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_sink_output_shape() {
        let buf = SharedBuf::default();
        let sink = JsonSink::new(buf.clone())
            .with_base_field("environment", "local")
            .with_base_field("service_name", "fibonacci-service");

        sink.handle(
            &Context::new(),
            LogRecord::new(LogLevel::Info, "fibonacci calculation started").with_field("n", 10),
        )
        .unwrap();

        let line = buf.contents();
        assert!(line.ends_with('\n'));
        let parsed: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["message"], "fibonacci calculation started");
        assert_eq!(parsed["environment"], "local");
        assert_eq!(parsed["service_name"], "fibonacci-service");
        assert_eq!(parsed["n"], 10);
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn test_enriched_json_line_carries_identifiers() {
        let buf = SharedBuf::default();
        let logger = Logger::new(Arc::new(TraceEnricher::new(JsonSink::new(buf.clone()))));

        logger.info(&context_with_ids(), "correlated");

        let parsed: Value = serde_json::from_str(buf.contents().trim_end()).unwrap();
        assert_eq!(parsed[TRACE_ID_FIELD], TRACE_ID_HEX);
        assert_eq!(parsed[SPAN_ID_FIELD], SPAN_ID_HEX);
    }
}
