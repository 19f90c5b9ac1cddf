// SPDX-License-Identifier: MIT

use scr_core::ExitCode;
use scr_envfilter::EnvFilterError;
use scr_expand::ExpandError;
use scr_security::SecurityViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(
        "legacy `vars = [\"k=v\", ...]` syntax found at {location}; declare a `[{location}.vars]` table instead"
    )]
    LegacyVarsSyntax { location: String },

    #[error("duplicate group name '{0}'")]
    DuplicateGroupName(String),

    #[error("group '{group}' command '{command}' has an empty cmd")]
    EmptyCmd { group: String, command: String },

    #[error("path '{value}' at {location} must be absolute")]
    NotAbsolute { location: String, value: String },

    #[error("malformed env_vars entry '{0}': expected 'KEY=VALUE'")]
    MalformedEnvVar(String),

    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error(transparent)]
    EnvFilter(#[from] EnvFilterError),

    #[error(transparent)]
    Security(#[from] SecurityViolation),
}

/// Every config-loading failure is a validation-class error (spec §7):
/// exit 2, except a hard-blocked or malformed `env_vars` entry, which is
/// a security-class failure (spec §4.5) and keeps `SecurityViolation`'s
/// own exit 4.
impl From<&ConfigError> for ExitCode {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::Security(source) => ExitCode::from(source),
            _ => ExitCode::ConfigError,
        }
    }
}
