//! Fixed-capacity in-memory ring of structured log entries
//!
//! Provides a concurrency-safe overwrite-oldest store of the most recent
//! log entries, severity filtering over the retained window, and a
//! `tracing_subscriber` layer that mirrors every emitted event into the
//! ring alongside whatever other layers the subscriber carries.

mod layer;
mod ring;
mod types;

pub use layer::RingLayer;
pub use ring::LogRing;
pub use types::{LogEntry, LogLevel};
