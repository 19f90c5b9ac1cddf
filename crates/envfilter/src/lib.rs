// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-envfilter: allowlisted, fail-closed environment import (spec
//! §4.7).

use std::collections::HashMap;

use scr_core::{EnvAllowlist, InheritMode};
use scr_security::{SecurityValidator, SecurityViolation};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvFilterError {
    #[error("environment variable '{0}' is not present in the scope's allowlist")]
    NotAllowlisted(String),

    #[error("environment variable '{0}' is not defined in the process environment")]
    Undefined(String),

    #[error("environment variable '{0}' is hard-blocked regardless of allowlist")]
    HardBlocked(String),

    #[error("environment variable '{0}' has a value containing a control character or disallowed metacharacter")]
    InvalidValue(String),
}

/// A one-time snapshot of the process environment (spec §4.7: "parses
/// the OS environment once per process").
#[derive(Debug, Clone)]
pub struct SystemEnv(HashMap<String, String>);

impl SystemEnv {
    pub fn snapshot() -> Self {
        SystemEnv(std::env::vars().collect())
    }

    /// Build a snapshot from an explicit map — used by tests and by any
    /// caller that wants reproducible environment input.
    pub fn from_map(map: HashMap<String, String>) -> Self {
        SystemEnv(map)
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        self.0.get(name)
    }
}

/// Resolve a scope's effective allowlist against its parent's (spec
/// §4.7: "the scope's declared list OR the parent's list"). `Clear`
/// replaces the parent's list outright rather than merging with it.
pub fn effective_allowlist(scope: &EnvAllowlist, parent: &[String]) -> Vec<String> {
    match scope.mode {
        InheritMode::Inherit => parent.to_vec(),
        InheritMode::Override => scope.names.clone(),
        InheritMode::Clear => Vec::new(),
    }
}

/// For each requested name: hard-blocked names are rejected outright;
/// otherwise require presence in `allowlist` and in `system_env`,
/// fail-closed on either gap (spec §4.7).
pub fn import_from_env(
    requested_names: &[String],
    allowlist: &[String],
    system_env: &SystemEnv,
) -> Result<HashMap<String, String>, EnvFilterError> {
    let mut out = HashMap::with_capacity(requested_names.len());
    for name in requested_names {
        if matches!(
            SecurityValidator::validate_environment_value(name, ""),
            Err(SecurityViolation::HardBlockedEnvVar(_))
        ) {
            return Err(EnvFilterError::HardBlocked(name.clone()));
        }
        if !allowlist.iter().any(|allowed| allowed == name) {
            return Err(EnvFilterError::NotAllowlisted(name.clone()));
        }
        let value = match system_env.get(name) {
            Some(value) => value.clone(),
            None => return Err(EnvFilterError::Undefined(name.clone())),
        };
        if SecurityValidator::validate_environment_value(name, &value).is_err() {
            return Err(EnvFilterError::InvalidValue(name.clone()));
        }
        out.insert(name.clone(), value);
    }
    Ok(out)
}
