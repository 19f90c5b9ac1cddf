// SPDX-License-Identifier: MIT

//! The redaction handler (spec §4.15, §9 "logging without re-entry"):
//! wraps the fan-out handler, runs every attribute through
//! `Redactor::redact_attribute`, and forwards. A fault in redaction
//! itself is routed to a separate, non-redacting failure logger so it
//! can never loop back through this same handler (and therefore never
//! reaches Slack).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use scr_security::{Attribute, RedactionContext, Redactor};

use crate::handler::Handler;
use crate::record::{flatten, LogRecord};

pub struct RedactingHandler {
    inner: Box<dyn Handler>,
    redactor: Arc<Redactor>,
    failure_logger: Box<dyn Handler>,
}

impl RedactingHandler {
    pub fn new(inner: Box<dyn Handler>, redactor: Arc<Redactor>, failure_logger: Box<dyn Handler>) -> Self {
        RedactingHandler {
            inner,
            redactor,
            failure_logger,
        }
    }
}

impl Handler for RedactingHandler {
    fn handle(&self, record: &LogRecord) {
        let outcome = catch_unwind(AssertUnwindSafe(|| redact_record(&self.redactor, record)));
        match outcome {
            Ok(redacted) => self.inner.handle(&redacted),
            Err(_) => {
                tracing::error!(
                    target: scr_security::REDACTION_FAILURE_TARGET,
                    "redaction handler panicked while processing a log record"
                );
                self.failure_logger.handle(record);
            }
        }
    }
}

fn redact_record(redactor: &Redactor, record: &LogRecord) -> LogRecord {
    let mut group = Vec::with_capacity(record.fields.len() + 1);
    if let Some(message) = &record.message {
        group.push(("message".to_string(), Attribute::String(message.clone())));
    }
    for (key, value) in &record.fields {
        group.push((key.clone(), Attribute::String(value.clone())));
    }

    let redacted = redactor.redact_attribute(&Attribute::Group(group), RedactionContext::root());
    let mut message = record.message.clone();
    let mut fields = Vec::with_capacity(record.fields.len());

    if let Attribute::Group(entries) = redacted {
        for (key, value) in entries {
            let text = flatten(&value);
            if key == "message" && record.message.is_some() {
                message = Some(text);
            } else {
                fields.push((key, text));
            }
        }
    }

    // Deferred attributes bypass `tracing`'s eager stringify visitor
    // entirely (spec §4.15): a caller that built the record directly
    // instead of going through a `tracing::Event` attaches a `LogValue`
    // here, and it's only ever resolved now, on the redaction path, not
    // at the call site.
    if !record.deferred.is_empty() {
        let deferred_group = Attribute::Group(record.deferred.clone());
        let redacted_deferred = redactor.redact_attribute(&deferred_group, RedactionContext::root());
        if let Attribute::Group(entries) = redacted_deferred {
            for (key, value) in entries {
                fields.push((key, flatten(&value)));
            }
        }
    }

    LogRecord {
        level: record.level,
        target: record.target.clone(),
        kind: record.kind,
        message,
        fields,
        deferred: Vec::new(),
        slack_requested: record.slack_requested,
    }
}
