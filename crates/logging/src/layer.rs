// SPDX-License-Identifier: MIT

//! Bridges `tracing::Event`s into [`LogRecord`]s and dispatches them to a
//! [`Handler`]. This is the only place that touches `tracing`'s borrowed
//! event/field types; everything downstream works with owned data.

use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::handler::Handler;
use crate::record::{LogRecord, RecordKind};

pub struct HandlerLayer {
    handler: Arc<dyn Handler>,
}

impl HandlerLayer {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        HandlerLayer { handler }
    }
}

impl<S: tracing::Subscriber> Layer<S> for HandlerLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            kind: visitor.kind.as_deref().map(RecordKind::from_tag).unwrap_or(RecordKind::Generic),
            message: visitor.message,
            fields: visitor.fields,
            deferred: Vec::new(),
            slack_requested: visitor.slack,
        };
        self.handler.handle(&record);
    }
}

/// Collects an event's fields, pulling out the well-known `message`,
/// `kind`, and `slack` names and leaving the rest as plain key/value
/// pairs for display (spec §6: Slack payload kind, group/command
/// attributes).
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    kind: Option<String>,
    slack: bool,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record(&mut self, name: &str, value: String) {
        match name {
            "message" => self.message = Some(value),
            "kind" => self.kind = Some(value),
            _ => self.fields.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field.name(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field.name(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "slack" {
            self.slack = value;
        } else {
            self.record(field.name(), value.to_string());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field.name(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field.name(), value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record(field.name(), value.to_string());
    }
}
