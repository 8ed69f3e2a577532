//! Log Capture Utilities for Testing
//!
//! Collects tracing events emitted while a closure runs, so tests can assert
//! that warnings were (or were not) logged.

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Captured log event
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    /// Structured fields as `name=value`
    pub fields: Vec<String>,
}

/// Log capture layer for testing
#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Records at exactly `level`
    pub fn at_level(&self, level: Level) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    /// Check if any log message matches pattern
    pub fn contains(&self, pattern: &str) -> bool {
        self.records().iter().any(|r| r.message.contains(pattern))
    }

    /// Assert at least one log matches pattern
    pub fn assert_contains(&self, pattern: &str) {
        assert!(
            self.contains(pattern),
            "Expected log matching '{}', but none found. All logs:\n{}",
            pattern,
            self.records()
                .iter()
                .map(|r| r.message.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    /// Assert no logs match pattern
    pub fn assert_no_match(&self, pattern: &str) {
        let matches: Vec<String> = self
            .records()
            .into_iter()
            .filter(|r| r.message.contains(pattern))
            .map(|r| r.message)
            .collect();
        assert!(
            matches.is_empty(),
            "Expected no logs matching '{}', but found {} matches:\n{}",
            pattern,
            matches.len(),
            matches.join("\n")
        );
    }
}

struct EventVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = rendered.trim_matches('"').to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), rendered.trim_matches('"')));
        }
    }
}

impl<S> Layer<S> for LogCapture
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);

        self.records.lock().unwrap().push(LogRecord {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Run `f` with a capturing subscriber installed for the current thread
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, LogCapture) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture)
}
