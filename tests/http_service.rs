//! End-to-end behaviour of the `/first` service.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{noop_metrics, EventCapture};
use otel_http_demo::config::Config;
use otel_http_demo::http::{router, HttpServer};
use otel_http_demo::startup_message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

#[tokio::test]
async fn first_returns_200_with_empty_body() {
    let response = router(noop_metrics())
        .oneshot(Request::get("/first").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn first_emits_exactly_one_info_record_per_request() {
    let capture = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = router(noop_metrics());
    for expected in 1..=3 {
        let response = app
            .clone()
            .oneshot(Request::get("/first").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // Every INFO event from the whole stack counts, not only the handler's.
        assert_eq!(capture.count_at(Level::INFO), expected, "{:?}", capture.events());
    }
}

#[tokio::test]
async fn unknown_route_is_not_found_and_not_logged() {
    let capture = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let response = router(noop_metrics())
        .oneshot(Request::get("/second").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(capture.count_at(Level::INFO), 0, "{:?}", capture.events());
}

#[tokio::test]
async fn post_to_first_is_rejected() {
    let response = router(noop_metrics())
        .oneshot(Request::post("/first").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn request_with_trace_context_still_succeeds() {
    let request = Request::get("/first")
        .header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        .body(Body::empty())
        .unwrap();
    let response = router(noop_metrics()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn scenario_default_port_and_startup_line() {
    let vars: HashMap<&str, &str> = HashMap::from([("OTEL_SERVICE_NAME", "demo")]);
    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

    assert_eq!(config.port, 8888);
    assert_eq!(config.bind_address(), "0.0.0.0:8888");
    let line = startup_message(&config.service_name, config.port);
    assert!(line.contains("demo"));
    assert!(line.contains("8888"));
}

#[tokio::test]
async fn bind_logs_service_name_and_port_before_serving() {
    let capture = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = Config {
        service_name: "demo".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    };
    let server = HttpServer::bind(&config, noop_metrics()).await.unwrap();
    let port = server.local_addr().unwrap().port().to_string();

    // `run` has not been called yet; the record must already exist.
    let startup: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.level == Level::INFO && e.field("port") == Some(port.as_str()))
        .collect();
    assert_eq!(startup.len(), 1, "{:?}", capture.events());
    assert_eq!(startup[0].field("service.name"), Some("demo"));
    assert_eq!(startup[0].target, "otel_http_demo::http");
}

#[tokio::test]
async fn server_answers_over_tcp_and_stops_on_cancel() {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    };
    let server = HttpServer::bind(&config, noop_metrics()).await.unwrap();
    let addr = server.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(server.run(shutdown.clone(), Duration::from_secs(2)));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /first HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
    let (_, body) = raw.split_once("\r\n\r\n").unwrap();
    assert!(body.is_empty(), "{body:?}");

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server should stop after cancellation")
        .expect("server task panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: taken.local_addr().unwrap().port(),
        ..Config::default()
    };
    assert!(HttpServer::bind(&config, noop_metrics()).await.is_err());
}
