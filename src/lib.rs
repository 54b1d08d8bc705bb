// SPDX-License-Identifier: MIT
//! A small HTTP service wired to an OpenTelemetry pipeline.
//!
//! The service exposes `GET /first`, which logs one informational record and answers
//! `200 OK` with an empty body. Everything around it is observability plumbing:
//! * Traces, metrics and logs exported over OTLP/HTTP (protobuf).
//! * Server spans per request, continuing the caller's W3C trace context.
//! * `tracing` events bridged into OTLP logs, correlated with the active span.
//!
//! The pieces are explicit values passed around by `main`: [`config::Config`],
//! [`telemetry::Telemetry`], [`http::HttpServer`] and a cancellation token fed by
//! [`shutdown::spawn_signal_listener`].
//!
//! # Quick Start
//! ```no_run
//! use otel_http_demo::{config::Config, http::{HttpMetrics, HttpServer}, telemetry::Telemetry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let telemetry = Telemetry::start(&config)?;
//! let server = HttpServer::bind(&config, HttpMetrics::new(&telemetry.meter())).await?;
//! server.run(CancellationToken::new(), config.shutdown_grace).await?;
//! telemetry.shutdown()?;
//! # Ok(()) }
//! ```
pub mod config;
pub mod http;
pub mod shutdown;
pub mod telemetry;

/// Line printed to stdout once the listener is bound.
pub fn startup_message(service_name: &str, port: u16) -> String {
    format!("Starting {service_name} on port {port}")
}
