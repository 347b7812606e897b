//! # HTTP Server Module
//!
//! The axum server behind `fibonacci-service`. Each request is handled on
//! its own task; the handler touches no shared mutable state, only the
//! injected logger and the request counter, both safe for concurrent use.
//!
//! Tracing layout per request: a server span wraps the whole handler and is
//! the last thing to end on every exit path; a child span wraps just the
//! computation and records the result attribute or the error.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use opentelemetry::metrics::Counter;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{global, Context, KeyValue};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::core::error::{AppError, AppResult};
use crate::fibonacci::{fibonacci, ComputeRequest, ComputeResponse};
use crate::observability::logging::Logger;
use crate::observability::propagation::extract_context;

const SERVER_TRACER: &str = "server";
const REQUEST_COUNTER: &str = "compute.requests";

/// Read-only state shared by all request-handling tasks
pub struct AppState {
    pub logger: Logger,
    requests: Counter<u64>,
}

impl AppState {
    pub fn new(logger: Logger) -> Self {
        let requests = global::meter("fibonacci-service")
            .u64_counter(REQUEST_COUNTER)
            .with_description("Number of compute requests handled, by outcome")
            .init();

        Self { logger, requests }
    }

    fn count_request(&self, outcome: &'static str) {
        self.requests.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}

/// Build the service router; `POST /compute` is the only route.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/compute", post(compute_handler))
        .with_state(state)
}

/// Bind the listener and serve until the token is cancelled, then stop
/// accepting connections and drain in-flight requests. The caller bounds
/// the drain with the configured grace period.
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> AppResult<()> {
    let logger = state.logger.clone();
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    logger.info(&Context::new(), &format!("listening on {addr}"));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Handle `POST /compute`: decode `{"n": <i64>}`, compute, answer
/// `{"f": <i64>}` or 400.
async fn compute_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let parent_cx = extract_context(&headers);
    let tracer = global::tracer(SERVER_TRACER);

    let span = tracer
        .span_builder("calculate_handler")
        .with_kind(SpanKind::Server)
        .start_with_context(&tracer, &parent_cx);
    let cx = parent_cx.with_span(span);

    state.logger.info(&cx, "fibonacci calculation started");

    cx.span().add_event("parsing request", vec![]);
    let request: ComputeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            state.count_request("invalid_request");
            cx.span().end();
            return AppError::invalid_request(err.to_string()).into_response();
        }
    };

    cx.span().add_event("calculate fibonacci", vec![]);
    let f = match traced_fibonacci(&tracer, &cx, request.n) {
        Ok(f) => f,
        Err(err) => {
            state.count_request("unsupported_input");
            cx.span().end();
            return err.into_response();
        }
    };

    cx.span().set_attribute(KeyValue::new("f", f));
    cx.span().set_status(Status::Ok);

    cx.span().add_event("writing response", vec![]);
    let response = match serde_json::to_vec(&ComputeResponse { f }) {
        Ok(body) => {
            state.count_request("success");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(err) => {
            cx.span().record_error(&err);
            cx.span().set_status(Status::error(err.to_string()));
            state.count_request("write_error");
            AppError::internal(err.to_string()).into_response()
        }
    };

    cx.span().end();
    response
}

/// Run the computation under its own child span, recording the result as an
/// attribute on success or the error and an error status on failure.
fn traced_fibonacci(
    tracer: &global::BoxedTracer,
    parent_cx: &Context,
    n: i64,
) -> AppResult<i64> {
    let span = tracer.start_with_context("fibonacci", parent_cx);
    let cx = parent_cx.with_span(span);

    let result = fibonacci(n);
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
