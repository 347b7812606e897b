//! # Compute Client and Load Generator
//!
//! [`ComputeClient`] issues a single traced `POST /compute` call with W3C
//! trace-context propagation, classifying every failure by the step that
//! produced it. [`LoadGenerator`] drives the client in a sequential loop
//! with randomized input, one request in flight at a time, until cancelled.

use std::time::Duration;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{global, Context, KeyValue};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio_util::sync::CancellationToken;

use crate::core::error::{AppError, AppResult};
use crate::fibonacci::{ComputeRequest, ComputeResponse};
use crate::observability::logging::{LogLevel, LogRecord, Logger};
use crate::observability::propagation::inject_context;

const CLIENT_TRACER: &str = "client";
const GENERATOR_TRACER: &str = "load-generator";

/// Exclusive upper bound for randomized inputs
const INPUT_RANGE: u64 = 100;

/// Pause between consecutive requests
const REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// HTTP client for the fibonacci-service
pub struct ComputeClient {
    http: reqwest::Client,
    compute_url: String,
}

impl ComputeClient {
    /// Create a client against the service's base URL.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            compute_url: format!("{}/compute", base_url.trim_end_matches('/')),
        }
    }

    /// Call `POST /compute` with `{"n": n}`, propagating `cx` so the
    /// service's spans attach under the caller's trace.
    ///
    /// Failures are classified by step (request construction, transport,
    /// non-200 status, response decode), recorded on the client span, and
    /// returned as error values.
    pub async fn call_compute(&self, cx: &Context, n: i64) -> AppResult<i64> {
        let tracer = global::tracer(CLIENT_TRACER);
        let span = tracer
            .span_builder("call fibonacci-service")
            .with_kind(SpanKind::Client)
            .start_with_context(&tracer, cx);
        let cx = cx.with_span(span);

        cx.span().set_attribute(KeyValue::new("n", n));

        let result = self.exchange(&cx, n).await;
        match &result {
            Ok(f) => {
                cx.span().set_attribute(KeyValue::new("f", *f));
                cx.span().set_status(Status::Ok);
            }
            Err(err) => {
                cx.span().record_error(err);
                cx.span().set_status(Status::error(err.to_string()));
            }
        }

        cx.span().end();
        result
    }

    async fn exchange(&self, cx: &Context, n: i64) -> AppResult<i64> {
        let mut headers = reqwest::header::HeaderMap::new();
        inject_context(cx, &mut headers);

        let request = self
            .http
            .post(&self.compute_url)
            .headers(headers)
            .json(&ComputeRequest { n })
            .build()
            .map_err(|err| AppError::request_build(err.to_string()))?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|err| AppError::transport(err.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body: ComputeResponse = response
            .json()
            .await
            .map_err(|err| AppError::response_decode(err.to_string()))?;

        Ok(body.f)
    }
}

/// Sequential randomized driver for the fibonacci-service
pub struct LoadGenerator {
    client: ComputeClient,
    logger: Logger,
    interval: Duration,
}

impl LoadGenerator {
    pub fn new(client: ComputeClient, logger: Logger) -> Self {
        Self {
            client,
            logger,
            interval: REQUEST_INTERVAL,
        }
    }

    /// Issue one request per interval until `shutdown` is cancelled.
    ///
    /// Cancellation is observed between requests and during the pause; a
    /// request already in flight is never aborted. A failed random draw
    /// skips the iteration and retries immediately on the next pass.
    pub async fn run(&self, shutdown: CancellationToken) {
        while !shutdown.is_cancelled() {
            let n = match draw_input() {
                Some(n) => n,
                None => continue,
            };

            self.exercise(n).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// One exchange under a fresh root span, outcome logged through the
    /// enriched sink so the line carries the trace identifiers.
    async fn exercise(&self, n: i64) {
        let tracer = global::tracer(GENERATOR_TRACER);
        let span = tracer.start("fibonacci");
        let cx = Context::new().with_span(span);

        match self.client.call_compute(&cx, n).await {
            Ok(f) => {
                self.logger.log(
                    &cx,
                    LogRecord::new(LogLevel::Info, "calculated fibonacci")
                        .with_field("n", n)
                        .with_field("fib", f),
                );
            }
            Err(err) => {
                cx.span().record_error(&err);
                cx.span().set_status(Status::error(err.to_string()));
                self.logger.log(
                    &cx,
                    LogRecord::new(LogLevel::Error, "couldn't calculate fibonacci")
                        .with_field("n", n)
                        .with_field("error", err.to_string()),
                );
            }
        }

        cx.span().end();
    }
}

/// Draw a uniformly random input in `[0, 100)` from the OS entropy source.
/// Returns `None` when the source fails; the caller skips that iteration.
fn draw_input() -> Option<i64> {
    let mut buf = [0u8; 8];
    OsRng.try_fill_bytes(&mut buf).ok()?;
    Some((u64::from_le_bytes(buf) % INPUT_RANGE) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_url_joins_cleanly() {
        let client = ComputeClient::new("http://localhost:8080");
        assert_eq!(client.compute_url, "http://localhost:8080/compute");

        let client = ComputeClient::new("http://localhost:8080/");
        assert_eq!(client.compute_url, "http://localhost:8080/compute");
    }

    #[test]
    fn test_draw_input_in_range() {
        for _ in 0..100 {
            let n = draw_input().expect("os entropy available");
            assert!((0..100).contains(&n));
        }
    }
}
