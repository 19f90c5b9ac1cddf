// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-logging: redacted, fan-out structured logging (spec §4.15).
//!
//! A [`LogRecord`] visits every registered [`Handler`]; the redacting
//! handler wraps that fan-out so every field is sanitized before it
//! reaches stderr, the log file, or Slack, while a second, non-redacting
//! failure logger absorbs the redaction subsystem's own diagnostics so
//! they can never loop back through it (spec §9).

mod file;
mod handler;
mod layer;
mod pipeline;
mod record;
mod redacting;
mod slack;
mod stderr;

pub use file::{FileHandler, FileHandlerError};
pub use handler::{FanOutHandler, Handler};
pub use layer::HandlerLayer;
pub use pipeline::{emit, init, slack_webhook_from_env, LoggingConfig, LoggingError, LoggingGuard};
pub use record::{LogRecord, RecordKind};
pub use redacting::RedactingHandler;
pub use slack::SlackHandler;
pub use stderr::StderrHandler;
