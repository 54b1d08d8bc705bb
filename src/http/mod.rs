// SPDX-License-Identifier: MIT
//! HTTP service exposing `GET /first`.
//!
//! # Layers (outermost first)
//! - `TraceLayer`: one server span per request, parented to the caller's trace context
//! - `metrics::track` (route layer): request counter and duration histogram
//!
//! Unmatched paths fall through to axum's default `404`.
pub mod handlers;
pub mod metrics;
pub mod trace;

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Config;
pub use metrics::HttpMetrics;

/// Build the application router.
pub fn router(http_metrics: HttpMetrics) -> Router {
    Router::new()
        .route("/first", get(handlers::first))
        .route_layer(middleware::from_fn_with_state(http_metrics, metrics::track))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::make_request_span)
                .on_response(trace::record_response),
        )
}

/// Bound listener plus router, ready to serve.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    /// Bind the configured address. Bind failures are returned to the caller.
    pub async fn bind(config: &Config, http_metrics: HttpMetrics) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            service.name = %config.service_name,
            address = %local_addr,
            port = local_addr.port(),
            "Listening for connections"
        );

        Ok(Self {
            listener,
            router: router(http_metrics),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` is cancelled.
    ///
    /// After cancellation the listener stops accepting and in-flight requests get up to
    /// `grace` to finish; whatever is still running after that is dropped.
    pub async fn run(self, shutdown: CancellationToken, grace: Duration) -> io::Result<()> {
        let stop = shutdown.clone();
        let serve = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => result?,
            _ = async {
                shutdown.cancelled().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "In-flight requests abandoned after grace period"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
