// SPDX-License-Identifier: MIT

//! Post-expansion runtime types (spec §3). Each references its source spec
//! and carries fully-expanded strings/arrays/env — no `%{...}` reference
//! survives past `scr-config::expand_*`.

use crate::spec::{CommandSpec, GlobalSpec, GroupSpec};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeGlobal {
    pub spec: GlobalSpec,
    pub expanded_vars: HashMap<String, String>,
    pub expanded_array_vars: HashMap<String, Vec<String>>,
    pub expanded_env: HashMap<String, String>,
    pub expanded_verify_files: Vec<String>,
    pub default_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RuntimeGroup {
    pub spec: GroupSpec,
    pub expanded_vars: HashMap<String, String>,
    pub expanded_array_vars: HashMap<String, Vec<String>>,
    pub expanded_env: HashMap<String, String>,
    pub expanded_verify_files: Vec<String>,
    pub expanded_cmd_allowed: Vec<String>,
    /// Absolute path of the group's effective working directory. Empty
    /// until `resolve_group_workdir` runs at group-execution start.
    pub effective_workdir: String,
    pub commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone)]
pub struct RuntimeCommand {
    pub spec: CommandSpec,
    pub expanded_vars: HashMap<String, String>,
    pub expanded_array_vars: HashMap<String, Vec<String>>,
    pub expanded_env: HashMap<String, String>,
    pub expanded_cmd: String,
    pub expanded_args: Vec<String>,
    pub effective_timeout: Duration,
    pub effective_workdir: String,
    pub effective_output_size_limit: u64,
}

impl RuntimeGroup {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

impl RuntimeCommand {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}
