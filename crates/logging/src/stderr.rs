// SPDX-License-Identifier: MIT

//! Plain-text stderr handler (spec §4.15, §9: part of the failure
//! logger's "non-Slack subset").

use crate::handler::Handler;
use crate::record::LogRecord;

pub struct StderrHandler;

impl Handler for StderrHandler {
    fn handle(&self, record: &LogRecord) {
        eprintln!("{}", format_line(record));
    }
}

pub(crate) fn format_line(record: &LogRecord) -> String {
    let mut line = format!("{:<5} {}", record.level, record.target);
    if let Some(message) = &record.message {
        line.push_str(" - ");
        line.push_str(message);
    }
    for (key, value) in &record.fields {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(value);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    #[test]
    fn formats_level_target_message_and_fields() {
        let record = LogRecord {
            level: tracing::Level::WARN,
            target: "scr_exec::executor".to_string(),
            kind: RecordKind::Generic,
            message: Some("command failed to run".to_string()),
            fields: vec![("elapsed_ms".to_string(), "12".to_string())],
            deferred: Vec::new(),
            slack_requested: false,
        };
        let line = format_line(&record);
        assert!(line.contains("WARN"));
        assert!(line.contains("scr_exec::executor"));
        assert!(line.contains("command failed to run"));
        assert!(line.contains("elapsed_ms=12"));
    }
}
