//! Tracing layer that mirrors events into a ring

use crate::ring::LogRing;
use crate::types::LogEntry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// A `tracing_subscriber` layer that records every event into a
/// [`LogRing`].
///
/// Composed into a registry alongside a fmt layer, so each emission
/// reaches both the process log output and the in-memory ring; the two
/// sinks are independent. The ring is shared by handle, not a process
/// global.
pub struct RingLayer {
    ring: Arc<LogRing>,
}

impl RingLayer {
    pub fn new(ring: Arc<LogRing>) -> Self {
        Self { ring }
    }
}

impl<S> Layer<S> for RingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        self.ring.add(LogEntry {
            time: Utc::now(),
            level: level_label(*event.metadata().level()).to_string(),
            message: visitor.message,
            attrs: visitor.attrs,
        });
    }
}

/// Map a tracing level onto the closed 4-value label set.
///
/// TRACE folds into DEBUG so every stored label stays inside the
/// severity order used by the filter.
fn level_label(level: Level) -> &'static str {
    match level {
        Level::TRACE | Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARN",
        Level::ERROR => "ERROR",
    }
}

/// Visitor collecting the event message and remaining fields as attrs
#[derive(Default)]
struct EntryVisitor {
    message: String,
    attrs: HashMap<String, serde_json::Value>,
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.attrs
                .insert(field.name().to_string(), serde_json::json!(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.attrs
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.attrs
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.attrs
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.attrs
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.attrs
                .insert(field.name().to_string(), serde_json::json!(rendered));
        }
    }
}
