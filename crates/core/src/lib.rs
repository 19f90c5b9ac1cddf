// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-core: shared data model for the safe command runner.
//!
//! Defines the load-time spec types (`ConfigSpec` and friends), the
//! post-expansion runtime types, the command-result record, the risk-level
//! enum, the exit-code taxonomy, and the hash-manifest path codec. Nothing
//! in this crate touches the filesystem, the network, or a process table —
//! those live in the leaf crates that depend on it.

pub mod exit_code;
pub mod manifest_key;
pub mod result;
pub mod risk;
pub mod spec;
pub mod runtime;
pub mod vars;

pub use exit_code::ExitCode;
pub use result::{CommandResult, ErrorKind};
pub use risk::RiskLevel;
pub use runtime::{RuntimeCommand, RuntimeGlobal, RuntimeGroup};
pub use spec::{CommandSpec, ConfigSpec, EnvAllowlist, GlobalSpec, GroupSpec, InheritMode};
pub use vars::VarValue;

/// Reserved prefix for automatically injected variables (e.g. `__runner_workdir`).
pub const RESERVED_VAR_PREFIX: &str = "__runner_";

/// Maximum number of variables permitted in a single scope.
pub const MAX_VARS_PER_SCOPE: usize = 1000;

/// Maximum length, in bytes, of a single string variable value.
pub const MAX_VAR_VALUE_BYTES: usize = 10 * 1024;

/// Maximum number of elements in an array variable.
pub const MAX_VAR_ARRAY_LEN: usize = 1000;

/// Returns true if `name` is a syntactically valid variable identifier:
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `name` falls in the reserved `__runner_*` namespace.
pub fn is_reserved_identifier(name: &str) -> bool {
    name.starts_with(RESERVED_VAR_PREFIX)
}
