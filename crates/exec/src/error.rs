// SPDX-License-Identifier: MIT

use scr_core::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkdirError {
    #[error("'{location}' resolved to a non-absolute path: '{value}'")]
    NotAbsolute { location: String, value: String },

    #[error("'{location}' contains a parent-directory reference: '{value}'")]
    ContainsParentRef { location: String, value: String },

    #[error("failed to create ephemeral working directory for group '{group}': {source}")]
    Create { group: String, source: std::io::Error },

    #[error("failed to set permissions on '{path}': {source}")]
    Permissions { path: String, source: std::io::Error },

    #[error("failed to expand '{location}': {source}")]
    Expand {
        location: String,
        source: scr_expand::ExpandError,
    },
}

impl From<&WorkdirError> for ExitCode {
    fn from(err: &WorkdirError) -> Self {
        match err {
            WorkdirError::NotAbsolute { .. } | WorkdirError::ContainsParentRef { .. } | WorkdirError::Expand { .. } => {
                ExitCode::ConfigError
            }
            WorkdirError::Create { .. } | WorkdirError::Permissions { .. } => ExitCode::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("working directory resolution failed: {0}")]
    Workdir(#[from] WorkdirError),

    #[error(transparent)]
    Config(#[from] scr_config::ConfigError),

    #[error(transparent)]
    Security(#[from] scr_security::SecurityViolation),

    #[error(transparent)]
    Verification(#[from] scr_verify::VerificationError),

    #[error(transparent)]
    Privilege(#[from] scr_privilege::PrivilegeError),

    #[error("unknown run_as_user '{0}'")]
    UnknownUser(String),

    #[error("unknown run_as_group '{0}'")]
    UnknownGroup(String),

    #[error("failed to spawn '{cmd}': {source}")]
    Spawn { cmd: String, source: std::io::Error },

    #[error("command '{name}' exited with code {exit_code}")]
    CommandFailed { name: String, exit_code: i32 },

    #[error("blocking task for '{0}' panicked")]
    TaskPanicked(String),
}

impl From<&ExecError> for ExitCode {
    fn from(err: &ExecError) -> Self {
        match err {
            ExecError::Workdir(source) => ExitCode::from(source),
            ExecError::Config(source) => ExitCode::from(source),
            ExecError::Security(source) => ExitCode::from(source),
            ExecError::Verification(source) => ExitCode::from(source),
            ExecError::Privilege(source) => ExitCode::from(source),
            ExecError::UnknownUser(_) | ExecError::UnknownGroup(_) => ExitCode::ConfigError,
            // The command never produced a result to inspect; treated the
            // same as an observed non-zero exit (spec §7's combined row).
            ExecError::Spawn { .. } | ExecError::CommandFailed { .. } => ExitCode::CommandFailure,
            ExecError::TaskPanicked(_) => ExitCode::Internal,
        }
    }
}

/// A group run that stopped partway: the commands that did complete are
/// preserved alongside the error that ended it, so the caller can still
/// emit a structured log record covering the whole sequence (spec
/// §4.13 step 6).
#[derive(Debug, Error)]
#[error("group '{group}' aborted after {} command(s): {source}", self.results.len())]
pub struct GroupError {
    pub group: String,
    pub results: Vec<scr_core::CommandResult>,
    #[source]
    pub source: ExecError,
}

impl From<&GroupError> for ExitCode {
    fn from(err: &GroupError) -> Self {
        ExitCode::from(&err.source)
    }
}
