// SPDX-License-Identifier: MIT

//! The record shape every handler consumes, already redacted and
//! detached from `tracing`'s borrowed `Event`/`Metadata` types so a
//! handler can hold one past the callback that produced it (spec §4.15,
//! §6 "log record structure").

use scr_security::Attribute;

/// Which Slack payload template applies to a record, chosen by the
/// caller via the `kind` tracing field (spec §4.15: "structured payload
/// varies by record kind").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    GroupSummary,
    PreExecutionError,
    SecurityAlert,
    PrivilegeEscalationFailure,
    Generic,
}

impl RecordKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "group_summary" => RecordKind::GroupSummary,
            "pre_execution_error" => RecordKind::PreExecutionError,
            "security_alert" => RecordKind::SecurityAlert,
            "privilege_escalation_failure" => RecordKind::PrivilegeEscalationFailure,
            _ => RecordKind::Generic,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: tracing::Level,
    pub target: String,
    pub kind: RecordKind,
    pub message: Option<String>,
    /// Flat field set, already redacted. `message` is not duplicated here.
    pub fields: Vec<(String, String)>,
    /// Values that haven't been materialized yet, carried alongside
    /// `fields` for callers that bypass `tracing`'s eager-stringify
    /// visitor (spec §4.15: `CommandResult`/group summary attach a
    /// `LogValue` here instead of a pre-rendered string). Empty for
    /// every record built from a `tracing::Event`, since `tracing`'s
    /// `Visit` API never hands back more than a primitive or `Debug`.
    pub deferred: Vec<(String, Attribute)>,
    /// `true` when the event carried an explicit `slack = true` field.
    pub slack_requested: bool,
}

/// Redacts and flattens an attribute tree into its final display form
/// (spec §4.15 "redacted before it reaches a sink").
pub(crate) fn flatten(attr: &Attribute) -> String {
    match attr {
        Attribute::String(s) => s.clone(),
        Attribute::Group(fields) => fields
            .iter()
            .map(|(k, v)| format!("{k}={}", flatten(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Attribute::Sequence(items) => items.iter().map(flatten).collect::<Vec<_>>().join(", "),
        Attribute::Deferred(value) => flatten(&value.produce_log_value()),
    }
}

impl LogRecord {
    /// A record reaches the Slack handler when the caller explicitly
    /// asked for it (`slack = true`) or the level is severe enough that
    /// silence would be worse than an unsolicited page.
    pub fn slack_eligible(&self) -> bool {
        self.slack_requested || self.level <= tracing::Level::ERROR
    }
}
