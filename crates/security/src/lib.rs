// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-security: redaction and the command risk/allowlist capability model
//! (spec §4.1, §4.4).

mod redactor;
mod risk_rules;
mod validator;

pub use redactor::{
    Attribute, LogValue, RedactionContext, Redactor, RedactorError, FAILURE_PLACEHOLDER,
    REDACTION_FAILURE_TARGET,
};
pub use risk_rules::{classify_risk, is_dangerous_root_command};
pub use validator::{SecurityValidator, SecurityViolation};

/// Depth at which `redact_attribute` stops recursing (spec §4.1: "at depth
/// == 10 the current value is returned unmodified").
pub const MAX_REDACTION_DEPTH: usize = 10;
