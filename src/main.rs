// SPDX-License-Identifier: MIT
use anyhow::Result;
use otel_http_demo::config::Config;
use otel_http_demo::http::{HttpMetrics, HttpServer};
use otel_http_demo::shutdown::spawn_signal_listener;
use otel_http_demo::startup_message;
use otel_http_demo::telemetry::Telemetry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    println!("--> Starting for {}", config.service_name);
    let telemetry = Telemetry::start(&config)?;

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::bind(&config, HttpMetrics::new(&telemetry.meter())).await?;
    let port = server.local_addr()?.port();
    println!("{}", startup_message(&config.service_name, port));

    server.run(shutdown, config.shutdown_grace).await?;

    info!("shutting down");
    match telemetry.shutdown_with_timeout(config.shutdown_grace).await {
        Ok(()) => info!("telemetry pipeline shut down"),
        Err(e) => warn!(error = %e, "telemetry shutdown incomplete"),
    }
    Ok(())
}
