//! # Telemetry Pipeline Construction
//!
//! Builds the OTLP trace and metric pipelines, installs the global
//! providers and the composite W3C trace-context + baggage propagator, and
//! hands back a guard whose `shutdown` flushes everything once all in-flight
//! work has finished. Any failure here is fatal at startup; the process must
//! not serve traffic without its telemetry pipeline.

use std::time::Duration;

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::MeterProvider as SdkMeterProvider;
use opentelemetry_sdk::propagation::{
    BaggagePropagator, TextMapCompositePropagator, TraceContextPropagator,
};
use opentelemetry_sdk::trace::Sampler;
use opentelemetry_sdk::{runtime, Resource};

use crate::core::config::Config;
use crate::core::error::AppResult;

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Owns the installed providers; call [`TelemetryGuard::shutdown`] exactly
/// once, after in-flight work has been given the chance to finish.
pub struct TelemetryGuard {
    meter_provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Flush and tear down both pipelines.
    pub fn shutdown(self) -> AppResult<()> {
        global::shutdown_tracer_provider();
        self.meter_provider.shutdown()?;
        Ok(())
    }
}

/// Initialize tracing, metrics, and propagation for this process.
///
/// Must be called from within a tokio runtime; the batch span processor and
/// the periodic metric reader run on it.
pub fn init_telemetry(config: &Config) -> AppResult<TelemetryGuard> {
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    let resource = telemetry_resource(config);

    init_tracer(config, resource.clone())?;
    let meter_provider = init_meter(config, resource)?;

    Ok(TelemetryGuard { meter_provider })
}

/// Resource attributes identifying this process in every span and metric.
fn telemetry_resource(config: &Config) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ])
}

fn init_tracer(config: &Config, resource: Resource) -> AppResult<()> {
    // install_batch sets the global tracer provider.
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(config.otel_exporter_endpoint.clone()),
        )
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_resource(resource),
        )
        .install_batch(runtime::Tokio)?;

    Ok(())
}

fn init_meter(config: &Config, resource: Resource) -> AppResult<SdkMeterProvider> {
    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(config.otel_exporter_endpoint.clone()),
        )
        .with_resource(resource)
        .with_period(METRIC_EXPORT_INTERVAL)
        .build()?;

    global::set_meter_provider(meter_provider.clone());

    Ok(meter_provider)
}
