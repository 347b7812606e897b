//! # Error Handling Module
//!
//! A single error enum covers both processes, with proper HTTP status
//! mapping for the service side. Each client-side variant identifies the
//! step of the exchange that failed (building the request, transport,
//! upstream status, decoding the response) so a log line or span event is
//! enough to locate the failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Error types for the Fibonacci service and its load generator
#[derive(Debug, Error, Clone)]
pub enum AppError {
    /// Missing or invalid environment configuration; fatal at startup
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The request body could not be decoded
    #[error("invalid request body: {message}")]
    InvalidRequest { message: String },

    /// The requested Fibonacci number would overflow a signed 64-bit integer
    #[error("unsupported fibonacci number {n}: too large")]
    UnsupportedInput { n: i64 },

    /// The outbound request could not be constructed
    #[error("couldn't create a request to the fibonacci-service: {message}")]
    RequestBuild { message: String },

    /// The outbound request could not be delivered
    #[error("couldn't call the fibonacci-service: {message}")]
    Transport { message: String },

    /// The service answered with an unexpected status code
    #[error("the fibonacci-service returned a non-200 response: {status}")]
    UpstreamStatus { status: u16 },

    /// The service answered 200 but the body was not decodable
    #[error("couldn't decode the fibonacci-service response: {message}")]
    ResponseDecode { message: String },

    /// Telemetry pipeline initialization or shutdown failure; fatal at startup
    #[error("telemetry error: {message}")]
    Telemetry { message: String },

    /// I/O errors (binding the listener, serving connections)
    #[error("i/o error: {message}")]
    Io { message: String },

    /// Unexpected internal failures
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid-request error with a custom message
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a request-construction error with a custom message
    pub fn request_build<S: Into<String>>(message: S) -> Self {
        Self::RequestBuild {
            message: message.into(),
        }
    }

    /// Create a transport error with a custom message
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a response-decode error with a custom message
    pub fn response_decode<S: Into<String>>(message: S) -> Self {
        Self::ResponseDecode {
            message: message.into(),
        }
    }

    /// Create a telemetry error with a custom message
    pub fn telemetry<S: Into<String>>(message: S) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::UnsupportedInput { .. } => StatusCode::BAD_REQUEST,
            Self::RequestBuild { .. } => StatusCode::BAD_GATEWAY,
            Self::Transport { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            Self::ResponseDecode { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Telemetry { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnsupportedInput { .. } => "unsupported_input",
            Self::RequestBuild { .. } => "request_build_error",
            Self::Transport { .. } => "transport_error",
            Self::UpstreamStatus { .. } => "upstream_status_error",
            Self::ResponseDecode { .. } => "response_decode_error",
            Self::Telemetry { .. } => "telemetry_error",
            Self::Io { .. } => "io_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest {
            message: err.to_string(),
        }
    }
}

impl From<opentelemetry::trace::TraceError> for AppError {
    fn from(err: opentelemetry::trace::TraceError) -> Self {
        Self::Telemetry {
            message: err.to_string(),
        }
    }
}

impl From<opentelemetry::metrics::MetricsError> for AppError {
    fn from(err: opentelemetry::metrics::MetricsError) -> Self {
        Self::Telemetry {
            message: err.to_string(),
        }
    }
}

/// Convert errors into HTTP responses with the mapped status code.
///
/// The 4xx contract only guarantees the status code; the JSON body is a
/// convenience for humans poking at the endpoint.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status, Json(error_response)).into_response()
    }
}
