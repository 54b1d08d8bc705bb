// SPDX-License-Identifier: MIT
//! Telemetry pipeline: traces, metrics and logs exported over OTLP/HTTP.
//!
//! The pipeline is an owned [`Telemetry`] value rather than ambient global state:
//!
//! * [`Telemetry::start`] – builds providers, registers them globally, installs the subscriber.
//! * [`Telemetry::meter`] – hands out a [`Meter`] for instruments owned by other components.
//! * [`Telemetry::shutdown`] / [`Telemetry::shutdown_with_timeout`] – flush before exit.
//!
//! # Example
//! ```no_run
//! use otel_http_demo::{config::Config, telemetry::Telemetry};
//! fn main() -> anyhow::Result<()> {
//!     let telemetry = Telemetry::start(&Config::from_env()?)?;
//!     // ... application logic ...
//!     telemetry.shutdown()?; // ensure final batches exported
//!     Ok(())
//! }
//! ```
//!
//! # Subscriber layers
//! * `EnvFilter` built from `RUST_LOG` (default `info`).
//! * Console fmt layer, compact or JSON depending on `APP_LOG_FORMAT`.
//! * `tracing-opentelemetry` span layer feeding the tracer provider.
//! * `opentelemetry-appender-tracing` bridge turning events into OTLP log records.
//!   Events carry the trace/span id of the enclosing span, so logs correlate with traces.
//!
//! # Error Handling
//! A signal whose exporter cannot be built runs without one; a warning goes to stderr since
//! no subscriber is installed yet. Shutdown aggregates provider errors into one `anyhow::Error`.
//!
//! # Threading Model
//! Batch processors and the periodic metric reader run on their own threads and use the
//! blocking HTTP client, which is why [`Telemetry::shutdown_with_timeout`] moves the
//! blocking flush onto Tokio's blocking pool.
use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

use crate::config::{Config, LogFormat};

/// Instrumentation scope name for the tracer and meter handed out by this crate.
pub const INSTRUMENTATION_SCOPE: &str = "otel-http-demo";

// Targets used by the exporters themselves. Bridging their events back into the log
// pipeline would make every export produce more logs to export.
const EXPORT_INTERNALS: [&str; 4] = ["hyper", "reqwest", "h2", "opentelemetry"];

/// Running telemetry pipeline.
///
/// Dropping the value without calling [`Telemetry::shutdown`] may lose the final
/// batches. Always shut down at a controlled point, typically just before exit.
pub struct Telemetry {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: SdkLoggerProvider,
}

impl Telemetry {
    /// Build the pipeline, register it process-wide and install the `tracing` subscriber.
    ///
    /// # Errors
    /// Fails if the log filter cannot be parsed or a global subscriber is already set.
    /// Exporter build failures are not errors; see the module docs.
    pub fn start(cfg: &Config) -> Result<Self> {
        let telemetry = Self::build(cfg);

        global::set_text_map_propagator(TraceContextPropagator::new());
        global::set_tracer_provider(telemetry.tracer_provider.clone());
        global::set_meter_provider(telemetry.meter_provider.clone());

        telemetry.install_subscriber(cfg)?;

        tracing::info!(
            service.name = %cfg.service_name,
            endpoint = %cfg.otlp_endpoint,
            traces = cfg.exporters.traces,
            metrics = cfg.exporters.metrics,
            logs = cfg.exporters.logs,
            "telemetry pipeline started"
        );
        Ok(telemetry)
    }

    /// Build providers without touching any process-wide state.
    pub fn build(cfg: &Config) -> Self {
        let resource = Resource::builder()
            .with_service_name(cfg.service_name.clone())
            .with_attributes([
                KeyValue::new("service.version", cfg.service_version.clone()),
                KeyValue::new("deployment.environment", cfg.environment.clone()),
            ])
            .build();

        let span_exporter = exporter_or_warn("trace", cfg.exporters.traces, || {
            SpanExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(cfg.signal_endpoint("traces"))
                .with_timeout(cfg.export_timeout)
                .build()
        });
        let metric_exporter = exporter_or_warn("metric", cfg.exporters.metrics, || {
            MetricExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(cfg.signal_endpoint("metrics"))
                .with_timeout(cfg.export_timeout)
                .build()
        });
        let log_exporter = exporter_or_warn("log", cfg.exporters.logs, || {
            LogExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(cfg.signal_endpoint("logs"))
                .with_timeout(cfg.export_timeout)
                .build()
        });

        let mut tracer_builder = SdkTracerProvider::builder().with_resource(resource.clone());
        if let Some(exporter) = span_exporter {
            tracer_builder = tracer_builder.with_batch_exporter(exporter);
        }

        let mut meter_builder = SdkMeterProvider::builder().with_resource(resource.clone());
        if let Some(exporter) = metric_exporter {
            let reader = PeriodicReader::builder(exporter)
                .with_interval(cfg.metric_interval)
                .build();
            meter_builder = meter_builder.with_reader(reader);
        }

        let mut logger_builder = SdkLoggerProvider::builder().with_resource(resource);
        if let Some(exporter) = log_exporter {
            logger_builder = logger_builder.with_batch_exporter(exporter);
        }

        Self {
            tracer_provider: tracer_builder.build(),
            meter_provider: meter_builder.build(),
            logger_provider: logger_builder.build(),
        }
    }

    /// Meter from this pipeline's provider.
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(INSTRUMENTATION_SCOPE)
    }

    fn install_subscriber(&self, cfg: &Config) -> Result<()> {
        let filter = EnvFilter::try_new(&cfg.log_level)?;

        let mut bridge_filter = EnvFilter::try_new(&cfg.log_level)?;
        for target in EXPORT_INTERNALS {
            bridge_filter =
                bridge_filter.add_directive(format!("{target}=off").parse::<Directive>()?);
        }
        let bridge_layer =
            OpenTelemetryTracingBridge::new(&self.logger_provider).with_filter(bridge_filter);

        let otel_trace_layer =
            OpenTelemetryLayer::new(self.tracer_provider.tracer(INSTRUMENTATION_SCOPE));

        // Console formatting: plain compact single-line output, or one JSON object per line.
        let compact_layer = (cfg.log_format == LogFormat::Compact).then(|| {
            fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact()
        });
        let json_layer = (cfg.log_format == LogFormat::Json)
            .then(|| fmt::layer().json().with_current_span(true));

        tracing_subscriber::registry()
            .with(filter)
            .with(compact_layer)
            .with(json_layer)
            .with(otel_trace_layer)
            .with(bridge_layer)
            .try_init()?;
        Ok(())
    }

    /// Flush and shut down every provider.
    ///
    /// Returns `Ok(())` if every provider shut down cleanly, otherwise one error naming
    /// each failing component.
    pub fn shutdown(self) -> Result<()> {
        let mut errs = Vec::new();
        if let Err(e) = self.tracer_provider.shutdown() {
            errs.push(format!("tracer: {e}"));
        }
        if let Err(e) = self.meter_provider.shutdown() {
            errs.push(format!("meter: {e}"));
        }
        if let Err(e) = self.logger_provider.shutdown() {
            errs.push(format!("logger: {e}"));
        }
        if errs.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(errs.join(", "))
        }
    }

    /// [`Telemetry::shutdown`] on the blocking pool, abandoned after `grace`.
    pub async fn shutdown_with_timeout(self, grace: Duration) -> Result<()> {
        let flush = tokio::task::spawn_blocking(move || self.shutdown());
        match tokio::time::timeout(grace, flush).await {
            Ok(joined) => joined?,
            Err(_) => anyhow::bail!("telemetry shutdown did not finish within {grace:?}"),
        }
    }
}

fn exporter_or_warn<T, E: Display>(
    signal: &str,
    enabled: bool,
    build: impl FnOnce() -> std::result::Result<T, E>,
) -> Option<T> {
    if !enabled {
        return None;
    }
    match build() {
        Ok(exporter) => Some(exporter),
        Err(e) => {
            eprintln!("telemetry: {signal} exporter unavailable, continuing without it: {e}");
            None
        }
    }
}
