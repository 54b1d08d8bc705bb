// SPDX-License-Identifier: MIT
//! Process configuration, read once from the environment at startup.
//!
//! Recognised variables:
//! * `OTEL_SERVICE_NAME` – service name resource attribute and startup banner.
//! * `APP_HOST` / `APP_PORT` – listener bind address (default `0.0.0.0:8888`).
//! * `OTEL_EXPORTER_OTLP_ENDPOINT` – base OTLP endpoint (e.g. `http://localhost:4318`).
//! * `OTEL_EXPORTER_OTLP_TIMEOUT` – per-export timeout in milliseconds.
//! * `OTEL_METRIC_EXPORT_INTERVAL` – periodic metric reader interval in milliseconds.
//! * `OTEL_TRACES_EXPORTER` / `OTEL_METRICS_EXPORTER` / `OTEL_LOGS_EXPORTER` – `otlp` or `none`.
//! * `RUST_ENV` – deployment environment (added as `deployment.environment`).
//! * `RUST_LOG` – log filter directives (default `info`).
//! * `APP_LOG_FORMAT` – console log format, `compact` or `json`.
//! * `APP_SHUTDOWN_GRACE_SECS` – upper bound for draining requests and flushing telemetry.
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_SERVICE_NAME: &str = "otel-http-demo";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_METRIC_INTERVAL_MS: u64 = 60_000;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Rejected configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("APP_PORT must be a port number between 1 and 65535, got {0:?}")]
    InvalidPort(String),
    #[error("OTEL_EXPORTER_OTLP_ENDPOINT must be an http(s) URL, got {0:?}")]
    InvalidEndpoint(String),
    #[error("{var} must be `otlp` or `none`, got {value:?}")]
    InvalidExporter { var: &'static str, value: String },
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("APP_LOG_FORMAT must be `compact` or `json`, got {0:?}")]
    InvalidLogFormat(String),
    #[error("OTEL_SERVICE_NAME must not be empty")]
    EmptyServiceName,
}

/// Console output format for the fmt layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Which telemetry signals get an OTLP exporter attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExporterSelection {
    pub traces: bool,
    pub metrics: bool,
    pub logs: bool,
}

impl ExporterSelection {
    /// No exporters at all; providers still exist so instrumentation stays wired.
    pub fn none() -> Self {
        Self {
            traces: false,
            metrics: false,
            logs: false,
        }
    }
}

impl Default for ExporterSelection {
    fn default() -> Self {
        Self {
            traces: true,
            metrics: true,
            logs: true,
        }
    }
}

/// Validated configuration shared by the telemetry bootstrap and the HTTP service.
///
/// All fields are owned so the struct can be cloned into tasks freely.
#[derive(Clone, Debug)]
pub struct Config {
    /// Service name reported in resource attributes (`service.name`).
    pub service_name: String,
    /// Service version reported in resource attributes (`service.version`).
    pub service_version: String,
    /// Deployment environment reported as `deployment.environment`.
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Base OTLP endpoint without the per-signal suffix.
    pub otlp_endpoint: String,
    pub export_timeout: Duration,
    pub metric_interval: Duration,
    pub exporters: ExporterSelection,
    /// Log filter directives (`RUST_LOG`, default `info`).
    pub log_level: String,
    pub log_format: LogFormat,
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "dev".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            export_timeout: Duration::from_millis(DEFAULT_EXPORT_TIMEOUT_MS),
            metric_interval: Duration::from_millis(DEFAULT_METRIC_INTERVAL_MS),
            exporters: ExporterSelection::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl Config {
    /// Read and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Missing variables fall back to defaults; present but malformed values are
    /// rejected rather than silently replaced.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let service_name = lookup("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name);
        if service_name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }

        let port = match lookup("APP_PORT") {
            Some(raw) => parse_port(&raw)?,
            None => defaults.port,
        };

        let otlp_endpoint = match lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            Some(raw) => validate_endpoint(&raw)?,
            None => defaults.otlp_endpoint,
        };

        let exporters = ExporterSelection {
            traces: exporter_enabled("OTEL_TRACES_EXPORTER", lookup("OTEL_TRACES_EXPORTER"))?,
            metrics: exporter_enabled("OTEL_METRICS_EXPORTER", lookup("OTEL_METRICS_EXPORTER"))?,
            logs: exporter_enabled("OTEL_LOGS_EXPORTER", lookup("OTEL_LOGS_EXPORTER"))?,
        };

        let log_format = match lookup("APP_LOG_FORMAT").as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        };

        Ok(Self {
            service_name,
            service_version: defaults.service_version,
            environment: lookup("RUST_ENV").unwrap_or(defaults.environment),
            host: lookup("APP_HOST").unwrap_or(defaults.host),
            port,
            otlp_endpoint,
            export_timeout: parse_millis(
                "OTEL_EXPORTER_OTLP_TIMEOUT",
                lookup("OTEL_EXPORTER_OTLP_TIMEOUT"),
                defaults.export_timeout,
            )?,
            metric_interval: parse_millis(
                "OTEL_METRIC_EXPORT_INTERVAL",
                lookup("OTEL_METRIC_EXPORT_INTERVAL"),
                defaults.metric_interval,
            )?,
            exporters,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            shutdown_grace: match lookup("APP_SHUTDOWN_GRACE_SECS") {
                Some(raw) => Duration::from_secs(parse_u64("APP_SHUTDOWN_GRACE_SECS", &raw)?),
                None => defaults.shutdown_grace,
            },
        })
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-signal OTLP/HTTP URL, e.g. `signal_endpoint("traces")` → `{base}/v1/traces`.
    pub fn signal_endpoint(&self, signal: &str) -> String {
        format!("{}/v1/{}", self.otlp_endpoint.trim_end_matches('/'), signal)
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(raw.to_string())),
    }
}

fn validate_endpoint(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidEndpoint(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEndpoint(raw.to_string()));
    }
    Ok(raw.to_string())
}

fn exporter_enabled(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("otlp") => Ok(true),
        Some("none") => Ok(false),
        Some(other) => Err(ConfigError::InvalidExporter {
            var,
            value: other.to_string(),
        }),
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.to_string(),
    })
}

fn parse_millis(
    var: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(raw) => Ok(Duration::from_millis(parse_u64(var, &raw)?)),
        None => Ok(default),
    }
}
