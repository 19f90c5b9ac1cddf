// SPDX-License-Identifier: MIT

//! Slack webhook delivery (spec §4.15): bounded queue drained by a
//! dedicated background thread so a slow or unreachable webhook never
//! stalls the orchestration loop.

use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use crate::handler::Handler;
use crate::record::{LogRecord, RecordKind};

const QUEUE_CAPACITY: usize = 256;
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed backoff sequence between retries (spec §4.15: "backoff
/// intervals derived from a deterministic sequence").
const BACKOFF: [Duration; MAX_ATTEMPTS as usize - 1] = [Duration::from_millis(500), Duration::from_secs(2)];

pub struct SlackHandler {
    sender: SyncSender<Value>,
}

impl SlackHandler {
    pub fn new(webhook_url: String) -> Self {
        let (sender, receiver) = sync_channel(QUEUE_CAPACITY);
        thread::Builder::new()
            .name("scr-logging-slack".to_string())
            .spawn(move || worker(webhook_url, receiver))
            .expect("failed to spawn slack delivery thread");
        SlackHandler { sender }
    }
}

impl Handler for SlackHandler {
    fn handle(&self, record: &LogRecord) {
        if !record.slack_eligible() {
            return;
        }
        let payload = build_payload(record);
        if let Err(TrySendError::Full(_)) = self.sender.try_send(payload) {
            tracing::warn!("slack queue full, dropping record");
        }
    }
}

fn worker(webhook_url: String, receiver: std::sync::mpsc::Receiver<Value>) {
    let client = match reqwest::blocking::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            tracing::warn!(%error, "failed to build slack http client, delivery disabled");
            return;
        }
    };

    while let Ok(payload) = receiver.recv() {
        deliver_with_retry(&client, &webhook_url, &payload);
    }
}

fn deliver_with_retry(client: &reqwest::blocking::Client, webhook_url: &str, payload: &Value) {
    for attempt in 0..MAX_ATTEMPTS {
        match client.post(webhook_url).json(payload).send() {
            Ok(response) if response.status().is_success() => return,
            Ok(response) if response.status().is_client_error() => {
                tracing::warn!(status = %response.status(), "slack webhook rejected payload, not retrying");
                return;
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), attempt, "slack delivery failed, will retry");
            }
            Err(error) => {
                tracing::warn!(%error, attempt, "slack delivery errored, will retry");
            }
        }
        if let Some(delay) = BACKOFF.get(attempt as usize) {
            thread::sleep(*delay);
        }
    }
    tracing::warn!("slack delivery exhausted retries, giving up");
}

fn build_payload(record: &LogRecord) -> Value {
    let fields: Value = record
        .fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
        .into();

    let title = match record.kind {
        RecordKind::GroupSummary => "Command group summary",
        RecordKind::PreExecutionError => "Pre-execution error",
        RecordKind::SecurityAlert => "Security alert",
        RecordKind::PrivilegeEscalationFailure => "Privilege escalation failure",
        RecordKind::Generic => "Runner event",
    };

    json!({
        "text": format!(
            "*{title}* ({level}) — {message}\n{target}\n{fields}",
            level = record.level,
            message = record.message.as_deref().unwrap_or(""),
            target = record.target,
            fields = fields,
        ),
    })
}
