// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration.
//!
//! ```rust,ignore
//! use tracing_subscriber::prelude::*;
//!
//! let sink = LogSink::new(config)?;
//! tracing_subscriber::registry()
//!     .with(SinkLayer::new(sink.clone()))
//!     .init();
//!
//! tracing::info!(user = "alice", "logged in");
//! ```
//!
//! The `message` field becomes the record message; every other event field is
//! added as an extra. Events emitted by the sink itself or by its HTTP stack
//! are dropped so they can never feed back into the buffer.

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::record::{LogLevel, LogRecord};
use crate::sink::LogSink;

/// Targets whose events never reach the sink.
pub const IGNORED_TARGETS: &[&str] = &[
    "es_log_sink",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target == *ignored
            || target
                .strip_prefix(ignored)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    error: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let text = value.to_string();
        self.error = Some(text.clone());
        self.insert(field, Value::from(text));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}

/// Forwards `tracing` events to a [`LogSink`].
#[derive(Debug, Clone)]
pub struct SinkLayer {
    sink: LogSink,
}

impl SinkLayer {
    #[must_use]
    pub fn new(sink: LogSink) -> Self {
        SinkLayer { sink }
    }

    fn to_record(event: &Event<'_>) -> LogRecord {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            metadata.target(),
            LogLevel::from(*metadata.level()),
            visitor.message.unwrap_or_default(),
        )
        .with_extras(visitor.fields);
        record.pathname = metadata.file().map(str::to_string);
        record.module = metadata.module_path().map(str::to_string);
        record.lineno = metadata.line();
        record.exc_text = visitor.error;
        record
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if is_ignored(event.metadata().target()) {
            return;
        }
        self.sink.emit(&Self::to_record(event));
    }
}
