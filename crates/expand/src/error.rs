// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ExpandError {
    #[error("invalid escape sequence '\\{0}' (only \\% and \\\\ are valid)")]
    InvalidEscape(char),

    #[error("unclosed variable reference: missing closing '}}'")]
    UnclosedReference,

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("circular variable reference: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),

    #[error("variable expansion exceeded the maximum nesting depth ({MAX} levels)", MAX = crate::MAX_EXPANSION_DEPTH)]
    MaxDepthExceeded,

    #[error("array variable '{0}' cannot be used in a string context")]
    ArrayInStringContext(String),

    #[error("invalid variable name '{0}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidVariableName(String),

    #[error("variable name '{0}' uses the reserved '__runner_' prefix")]
    ReservedVariableName(String),

    #[error("variable '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("scope declares {0} variables, exceeding the limit of {MAX}", MAX = scr_core::MAX_VARS_PER_SCOPE)]
    TooManyVariables(usize),
}
