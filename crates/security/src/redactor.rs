// SPDX-License-Identifier: MIT

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

/// Placeholder substituted for the entire value when redaction itself
/// fails — regex compile failure, depth exhaustion of a deferred value, or
/// a panic inside a [`LogValue::produce_log_value`] implementation.
pub const FAILURE_PLACEHOLDER: &str = "[REDACTION FAILED - OUTPUT SUPPRESSED]";

/// Tracing target used for the redaction subsystem's own failure
/// diagnostics. A logging pipeline must route events carrying this target
/// straight to its non-redacting failure logger, never back through the
/// redacting layer (spec §7: "logging without re-entry").
pub const REDACTION_FAILURE_TARGET: &str = "scr_security::redaction_failure";

#[derive(Debug, Error)]
pub enum RedactorError {
    #[error("pattern {index} failed to compile: {source}")]
    PatternCompile { index: usize, source: regex::Error },
}

/// A structured log attribute, mirroring the shapes a `tracing::Value`
/// fan-out actually needs to redact: plain strings, named groups
/// (recurse + per-key sensitivity check), ordered sequences (recurse,
/// preserve shape), and deferred values that only materialize when asked.
#[derive(Clone)]
pub enum Attribute {
    String(String),
    Group(Vec<(String, Attribute)>),
    Sequence(Vec<Attribute>),
    Deferred(Arc<dyn LogValue>),
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attribute::String(s) => write!(f, "String({s:?})"),
            Attribute::Group(fields) => write!(f, "Group({fields:?})"),
            Attribute::Sequence(items) => write!(f, "Sequence({items:?})"),
            Attribute::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

/// Analogue of a lazily-materialized log value (e.g. a `CommandResult`
/// attached to a summary record so it's only serialized if the record is
/// actually emitted).
pub trait LogValue: Send + Sync {
    fn produce_log_value(&self) -> Attribute;
}

/// Depth/visited-state threaded through a single `redact_attribute` call
/// tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedactionContext {
    depth: usize,
}

impl RedactionContext {
    pub fn root() -> Self {
        RedactionContext { depth: 0 }
    }

    fn descend(self) -> Self {
        RedactionContext { depth: self.depth + 1 }
    }
}

/// Pattern-based secret masking over strings, named attribute groups, and
/// deferred values.
pub struct Redactor {
    patterns: Option<Vec<Regex>>,
    sensitive_keys: Vec<String>,
}

impl Redactor {
    /// Compile `patterns` (key/value and header regexes, spec §4.1).
    /// `sensitive_keys` are attribute-name substrings (case-insensitive)
    /// that force full-value redaction regardless of whether the value's
    /// text matches any pattern.
    pub fn new(patterns: &[String], sensitive_keys: Vec<String>) -> Self {
        let compiled: Result<Vec<Regex>, RedactorError> = patterns
            .iter()
            .enumerate()
            .map(|(index, p)| Regex::new(p).map_err(|source| RedactorError::PatternCompile { index, source }))
            .collect();

        match compiled {
            Ok(regexes) => Redactor {
                patterns: Some(regexes),
                sensitive_keys,
            },
            Err(err) => {
                tracing::error!(target: REDACTION_FAILURE_TARGET, error = %err, "redaction pattern compile failure, entering fail-secure mode");
                Redactor {
                    patterns: None,
                    sensitive_keys,
                }
            }
        }
    }

    /// The default key/value and header patterns: `key=value`/`key:
    /// value` pairs for common secret-shaped names, and `Authorization`
    /// style headers. Each pattern captures the key/label it matched in
    /// group 1 so the replacement can keep `key=` and redact only the
    /// value (spec §8 scenario 5: `api_key=[REDACTED]`, not a bare
    /// `[REDACTED]`).
    pub fn with_default_patterns() -> Self {
        let patterns = vec![
            r#"(?i)(\b(?:api[_-]?key|apikey|access[_-]?key|secret|token|password|passwd|pwd|credential|auth[_-]?token)\s*[:=]\s*)['"]?[A-Za-z0-9+/_=\-.]{4,}['"]?"#.to_string(),
            r#"(?i)(\bauthorization\s*:\s*(?:bearer|basic)\s+)\S+"#.to_string(),
            r#"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----"#.to_string(),
        ];
        let sensitive_keys = vec![
            "password".to_string(),
            "passwd".to_string(),
            "token".to_string(),
            "secret".to_string(),
            "api_key".to_string(),
            "apikey".to_string(),
            "credential".to_string(),
            "auth".to_string(),
        ];
        Redactor::new(&patterns, sensitive_keys)
    }

    /// Apply the configured patterns to `s`, replacing each match's value
    /// with `[REDACTED]` while preserving a captured key/label prefix (if
    /// any). Fail-secure: if construction failed to compile every
    /// pattern, the *entire* input is replaced rather than passed through.
    pub fn redact_text(&self, s: &str) -> String {
        match &self.patterns {
            None => FAILURE_PLACEHOLDER.to_string(),
            Some(patterns) => {
                let mut out = s.to_string();
                for re in patterns {
                    out = re.replace_all(&out, "${1}[REDACTED]").into_owned();
                }
                out
            }
        }
    }

    fn is_sensitive_key(&self, key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        self.sensitive_keys.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Redact a structured attribute tree (spec §4.1 `redact_attribute`).
    pub fn redact_attribute(&self, attr: &Attribute, ctx: RedactionContext) -> Attribute {
        if ctx.depth >= crate::MAX_REDACTION_DEPTH {
            tracing::debug!(target: REDACTION_FAILURE_TARGET, depth = ctx.depth, "redaction depth bound reached, returning value unmodified");
            return clone_unredacted(attr);
        }

        match attr {
            Attribute::String(s) => Attribute::String(self.redact_text(s)),
            Attribute::Group(fields) => Attribute::Group(
                fields
                    .iter()
                    .map(|(key, value)| {
                        if self.is_sensitive_key(key) {
                            (key.clone(), Attribute::String("[REDACTED]".to_string()))
                        } else {
                            (key.clone(), self.redact_attribute(value, ctx.descend()))
                        }
                    })
                    .collect(),
            ),
            Attribute::Sequence(items) => Attribute::Sequence(
                items.iter().map(|item| self.redact_attribute(item, ctx.descend())).collect(),
            ),
            Attribute::Deferred(value) => {
                let resolved = catch_unwind(AssertUnwindSafe(|| value.produce_log_value()));
                match resolved {
                    Ok(resolved) => self.redact_attribute(&resolved, ctx.descend()),
                    Err(_) => {
                        tracing::warn!(target: REDACTION_FAILURE_TARGET, "deferred log value panicked during resolution");
                        Attribute::String(FAILURE_PLACEHOLDER.to_string())
                    }
                }
            }
        }
    }
}

/// Clones an attribute tree without redacting it (used once the depth
/// bound in `redact_attribute` has already been hit). Still depth-bounded
/// on its own terms: a `Deferred` value's `produce_log_value` can itself
/// return another `Deferred` (the cyclic-`LogValue` case), so resolving it
/// with no bound here would recurse unboundedly even though the caller
/// already stopped redacting.
fn clone_unredacted(attr: &Attribute) -> Attribute {
    clone_unredacted_bounded(attr, 0)
}

fn clone_unredacted_bounded(attr: &Attribute, depth: usize) -> Attribute {
    if depth >= crate::MAX_REDACTION_DEPTH {
        return Attribute::String(FAILURE_PLACEHOLDER.to_string());
    }
    match attr {
        Attribute::String(s) => Attribute::String(s.clone()),
        Attribute::Group(fields) => Attribute::Group(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), clone_unredacted_bounded(v, depth + 1)))
                .collect(),
        ),
        Attribute::Sequence(items) => {
            Attribute::Sequence(items.iter().map(|item| clone_unredacted_bounded(item, depth + 1)).collect())
        }
        Attribute::Deferred(value) => match catch_unwind(AssertUnwindSafe(|| value.produce_log_value())) {
            Ok(resolved) => clone_unredacted_bounded(&resolved, depth + 1),
            Err(_) => Attribute::String(FAILURE_PLACEHOLDER.to_string()),
        },
    }
}
