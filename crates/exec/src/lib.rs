// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-exec: ephemeral working directories, process spawning with
//! timeout/output bounds, and per-group orchestration (spec §4.11-§4.13).

mod error;
mod executor;
mod group;
mod resources;

pub use error::{ExecError, GroupError, WorkdirError};
pub use executor::{Executor, KILL_GRACE_PERIOD, TIMEOUT_EXIT_CODE};
pub use group::GroupExecutor;
pub use resources::{resolve_command_workdir, resolve_group_workdir, TempDirManager};
