//! # Configuration Module
//!
//! Environment-based configuration for both binaries. Every value is an
//! opaque lookup against the process environment; required values that are
//! missing produce a fatal [`AppError::Configuration`] before the process
//! serves any traffic.
//!
//! Lookups are expressed against a closure rather than `std::env` directly
//! so tests can substitute their own environment without mutating process
//! state.

use std::time::Duration;

use crate::core::error::{AppError, AppResult};

pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";
pub const ENV_SERVICE_VERSION: &str = "SERVICE_VERSION";
pub const ENV_REST_PORT: &str = "REST_PORT";
pub const ENV_SHUTDOWN_TIMEOUT: &str = "SHUTDOWN_TIMEOUT";
pub const ENV_FIBONACCI_SERVICE_URL: &str = "FIBONACCI_SERVICE_URL";
pub const ENV_OTEL_EXPORTER_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const DEFAULT_ENVIRONMENT: &str = "local";
const DEFAULT_SERVICE_VERSION: &str = "dev";
const DEFAULT_REST_PORT: u16 = 8080;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);

/// Process configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment name (e.g. `local`, `staging`, `production`)
    pub environment: String,

    /// Service name reported in telemetry resources and log base fields
    pub service_name: String,

    /// Service version, lowercased
    pub service_version: String,

    /// Port the HTTP server listens on
    pub rest_port: u16,

    /// Grace period given to in-flight requests during shutdown
    pub shutdown_timeout: Duration,

    /// Base URL of the fibonacci-service; only the load generator needs it
    pub fibonacci_service_url: Option<String>,

    /// OTLP exporter endpoint for traces and metrics
    pub otel_exporter_endpoint: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let environment =
            optional(&lookup, ENV_ENVIRONMENT).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let service_name = require(&lookup, ENV_SERVICE_NAME)?;

        let service_version = optional(&lookup, ENV_SERVICE_VERSION)
            .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string())
            .to_lowercase();

        let rest_port = match optional(&lookup, ENV_REST_PORT) {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::config(format!("invalid {ENV_REST_PORT} value: {raw:?}"))
            })?,
            None => DEFAULT_REST_PORT,
        };

        let shutdown_timeout = match optional(&lookup, ENV_SHUTDOWN_TIMEOUT) {
            Some(raw) => humantime::parse_duration(&raw).map_err(|err| {
                AppError::config(format!("invalid {ENV_SHUTDOWN_TIMEOUT} value {raw:?}: {err}"))
            })?,
            None => DEFAULT_SHUTDOWN_TIMEOUT,
        };

        let fibonacci_service_url = optional(&lookup, ENV_FIBONACCI_SERVICE_URL);

        let otel_exporter_endpoint = require(&lookup, ENV_OTEL_EXPORTER_ENDPOINT)?;

        Ok(Self {
            environment,
            service_name,
            service_version,
            rest_port,
            shutdown_timeout,
            fibonacci_service_url,
            otel_exporter_endpoint,
        })
    }

    /// The load generator cannot run without a downstream URL.
    pub fn require_fibonacci_service_url(&self) -> AppResult<&str> {
        self.fibonacci_service_url
            .as_deref()
            .ok_or_else(|| AppError::config(format!("{ENV_FIBONACCI_SERVICE_URL} is not set")))
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.is_empty())
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> AppResult<String> {
    optional(lookup, key).ok_or_else(|| AppError::config(format!("{key} is not set")))
}
