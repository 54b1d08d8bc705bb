//! Shared utilities for integration tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use otel_http_demo::http::HttpMetrics;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Instruments backed by the no-op global meter.
pub fn noop_metrics() -> HttpMetrics {
    HttpMetrics::new(&opentelemetry::global::meter("tests"))
}

/// One event as seen by [`EventCapture`]; field values are their `Debug` rendering.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Layer recording every event it sees, at any level and target.
#[derive(Clone, Default)]
pub struct EventCapture(Arc<Mutex<Vec<CapturedEvent>>>);

impl EventCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.0.lock().unwrap().iter().filter(|e| e.level == level).count()
    }
}

struct FieldMap<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldMap<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldMap(&mut fields));
        self.0.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields,
        });
    }
}
