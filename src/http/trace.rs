// SPDX-License-Identifier: MIT
//! Server spans for inbound requests.
//!
//! Each request gets a `tracing` span that `tracing-opentelemetry` turns into an OTel
//! server span. The parent context comes from W3C Trace Context headers
//! (`traceparent`, `tracestate`) via the globally registered propagator, so a caller's
//! trace continues through this service.
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response};
use opentelemetry::propagation::Extractor;
use opentelemetry::{global, Context};
use tracing::field::Empty;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Read-only view of HTTP headers for the propagator.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Remote parent context carried by the request headers, if any.
pub fn extract_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// `make_span_with` hook for `TraceLayer`.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    let span = tracing::info_span!(
        "http.request",
        otel.name = %format!("{method} {path}"),
        otel.kind = "server",
        http.request.method = %method,
        url.path = %path,
        http.response.status_code = Empty,
        otel.status_code = Empty,
    );
    if let Err(e) = span.set_parent(extract_context(request.headers())) {
        tracing::debug!(error = %e, "remote trace context not attached to request span");
    }
    span
}

/// `on_response` hook for `TraceLayer`.
pub fn record_response(response: &Response<Body>, latency: Duration, span: &Span) {
    let status = response.status();
    span.record("http.response.status_code", status.as_u16());
    if status.is_server_error() {
        span.record("otel.status_code", "ERROR");
    }
    tracing::debug!(
        status = status.as_u16(),
        latency_secs = latency.as_secs_f64(),
        "response sent"
    );
}
