// SPDX-License-Identifier: MIT

//! Wires the handler-based fan-out into a global `tracing` subscriber
//! (spec §4.14 "bootstrap logging", §4.15).

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use scr_security::Redactor;
use thiserror::Error;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::file::{FileHandler, FileHandlerError};
use crate::handler::{FanOutHandler, Handler};
use crate::layer::HandlerLayer;
use crate::record::LogRecord;
use crate::redacting::RedactingHandler;
use crate::slack::SlackHandler;
use crate::stderr::StderrHandler;

/// The installed root handler (the redacting fan-out `init` builds),
/// reachable outside the `tracing` macro path for callers that need to
/// attach a [`crate::record::LogRecord::deferred`] value `tracing`'s
/// eager-stringify `Visit` API could never carry (spec §4.15).
static ROOT_HANDLER: OnceLock<Arc<dyn Handler>> = OnceLock::new();

/// Dispatches `record` straight to the installed root handler, skipping
/// `tracing::Event` entirely. A no-op before `init` has run, the same
/// as an event emitted with no subscriber installed.
pub fn emit(record: LogRecord) {
    if let Some(handler) = ROOT_HANDLER.get() {
        handler.handle(&record);
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    File(#[from] FileHandlerError),
    #[error("failed to install the global tracing subscriber")]
    AlreadyInitialized,
}

/// CLI-derived settings for logging bootstrap (spec §4.14, §6 `--log-level`).
pub struct LoggingConfig {
    pub log_level: String,
    pub log_file: PathBuf,
    pub slack_webhook_url: Option<String>,
    pub quiet: bool,
}

/// Keeps the non-blocking file writer's background flush thread alive
/// for the process lifetime; dropping it early truncates the log.
pub struct LoggingGuard {
    _file: Arc<FileHandler>,
}

/// Builds the redacted multi-handler and the separate non-redacting
/// failure logger, then installs both as `tracing-subscriber` layers
/// filtered by target so the failure logger only ever sees the
/// redaction subsystem's own diagnostics (spec §9 "logging without
/// re-entry") and never double-processes ordinary events.
pub fn init(config: LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let file = Arc::new(FileHandler::open(&config.log_file)?);

    let mut sinks: Vec<Box<dyn Handler>> = Vec::new();
    if !config.quiet {
        sinks.push(Box::new(StderrHandler));
    }
    sinks.push(Box::new(file.clone()));
    if let Some(url) = config.slack_webhook_url {
        sinks.push(Box::new(SlackHandler::new(url)));
    }

    let failure_handler: Arc<dyn Handler> =
        Arc::new(FanOutHandler::new(vec![Box::new(StderrHandler), Box::new(file.clone())]));

    let redacting: Arc<dyn Handler> = Arc::new(RedactingHandler::new(
        Box::new(FanOutHandler::new(sinks)),
        Arc::new(Redactor::with_default_patterns()),
        Box::new(failure_handler.clone()),
    ));
    let _ = ROOT_HANDLER.set(redacting.clone());

    let main_layer = HandlerLayer::new(redacting)
        .with_filter(filter_fn(|meta| meta.target() != scr_security::REDACTION_FAILURE_TARGET));
    let failure_layer = HandlerLayer::new(failure_handler)
        .with_filter(filter_fn(|meta| meta.target() == scr_security::REDACTION_FAILURE_TARGET));

    let env_filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| EnvFilter::try_new(&config.log_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(main_layer)
        .with(failure_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard { _file: file })
}

pub fn slack_webhook_from_env() -> Option<String> {
    std::env::var("SLACK_WEBHOOK_URL").ok().filter(|s| !s.is_empty())
}
