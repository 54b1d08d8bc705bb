// SPDX-License-Identifier: MIT
//! HTTP server metrics.
//!
//! - `http.server.requests` (counter): completed requests
//! - `http.server.request.duration` (histogram, seconds): handler latency
//!
//! Both carry `http.request.method`, `http.route` and `http.response.status_code`.
//! The middleware is installed as a route layer, so only matched routes are measured.
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

pub const REQUESTS_METRIC: &str = "http.server.requests";
pub const DURATION_METRIC: &str = "http.server.request.duration";

/// Instruments shared by every request.
#[derive(Clone)]
pub struct HttpMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
}

impl HttpMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter(REQUESTS_METRIC)
                .with_description("Number of completed HTTP requests")
                .build(),
            duration: meter
                .f64_histogram(DURATION_METRIC)
                .with_description("Duration of HTTP server requests")
                .with_unit("s")
                .build(),
        }
    }

    pub fn record(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let attributes = [
            KeyValue::new("http.request.method", method.to_string()),
            KeyValue::new("http.route", route.to_string()),
            KeyValue::new("http.response.status_code", i64::from(status)),
        ];
        self.requests.add(1, &attributes);
        self.duration.record(elapsed.as_secs_f64(), &attributes);
    }
}

/// Route-layer middleware recording [`HttpMetrics`] for each request.
pub async fn track(State(metrics): State<HttpMetrics>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    metrics.record(&method, &route, response.status().as_u16(), start.elapsed());
    response
}
