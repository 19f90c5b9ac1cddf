// SPDX-License-Identifier: MIT

//! Maps every library error reachable from [`crate::runner::Runner::run`]
//! onto one of the six process exit codes (spec §6, §7). Each leaf crate
//! already implements `From<&ItsOwnError> for scr_core::ExitCode`; this
//! type is just the dispatch point that picks which of those to call.

use scr_core::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] scr_config::ConfigError),

    #[error(transparent)]
    Verification(#[from] scr_verify::VerificationError),

    #[error(transparent)]
    Group(#[from] scr_exec::GroupError),

    #[error("a blocking task for '{0}' panicked")]
    TaskPanicked(String),
}

impl RunnerError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunnerError::Config(source) => ExitCode::from(source),
            RunnerError::Verification(source) => ExitCode::from(source),
            RunnerError::Group(source) => ExitCode::from(source),
            RunnerError::TaskPanicked(_) => ExitCode::Internal,
        }
    }
}
