// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use scr_core::{CommandSpec, ConfigSpec, EnvAllowlist, GlobalSpec, GroupSpec, RuntimeCommand, RuntimeGlobal, RuntimeGroup};
use scr_envfilter::{effective_allowlist, import_from_env, SystemEnv};
use scr_expand::{expand_string, process_vars, EagerResolver, ExpandContext};
use scr_security::SecurityValidator;

use crate::error::ConfigError;
use crate::legacy::detect_legacy_vars;

/// A fully parsed and globally-expanded config, ready for per-group
/// materialization by the execution layer.
pub struct LoadedConfig {
    pub spec: ConfigSpec,
    pub global: RuntimeGlobal,
    pub global_allowlist: Vec<String>,
}

/// Parse, validate, and globally expand a config file (spec §4.9).
/// Per-group and per-command expansion happen later, against the
/// resolved workdir — see `expand_group`/`expand_command`.
pub fn load(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    load_str(&raw)
}

pub fn load_str(raw: &str) -> Result<LoadedConfig, ConfigError> {
    detect_legacy_vars(raw)?;
    let spec: ConfigSpec = toml::from_str(raw)?;
    validate_structure(&spec)?;

    let system_env = SystemEnv::snapshot();
    let (global, global_allowlist) = expand_global(&spec.global, &system_env)?;

    Ok(LoadedConfig {
        spec,
        global,
        global_allowlist,
    })
}

fn validate_structure(spec: &ConfigSpec) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for group in &spec.groups {
        if !seen.insert(group.name.clone()) {
            return Err(ConfigError::DuplicateGroupName(group.name.clone()));
        }
        for command in &group.commands {
            if command.cmd.trim().is_empty() {
                return Err(ConfigError::EmptyCmd {
                    group: group.name.clone(),
                    command: command.name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn split_kv(raw: &str) -> Result<(String, String), ConfigError> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| ConfigError::MalformedEnvVar(raw.to_string()))
}

/// Expands each `"KEY=VALUE"` entry, then runs the result through the
/// same hard-block/control-character check `import_from_env` applies to
/// variables pulled in via `env_import` — templates in `env_vars` must
/// not be a side door around that invariant (spec §4.5, §4.9).
fn expand_env_vars(
    raw: &[String],
    base_vars: &HashMap<String, String>,
    imported: HashMap<String, String>,
) -> Result<HashMap<String, String>, ConfigError> {
    let mut out = imported;
    for entry in raw {
        let (key, value) = split_kv(entry)?;
        let mut resolver = EagerResolver::new(base_vars.clone());
        let expanded = expand_string(&value, &mut resolver, &ExpandContext::root())?;
        SecurityValidator::validate_environment_value(&key, &expanded)?;
        out.insert(key, expanded);
    }
    Ok(out)
}

fn expand_each(raw: &[String], base_vars: &HashMap<String, String>) -> Result<Vec<String>, ConfigError> {
    raw.iter()
        .map(|s| {
            let mut resolver = EagerResolver::new(base_vars.clone());
            expand_string(s, &mut resolver, &ExpandContext::root()).map_err(ConfigError::from)
        })
        .collect()
}

fn require_absolute(location: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::NotAbsolute {
            location: location.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// `expand_global` (spec §4.9): system env parse → `import_from_env`
/// merge → `process_vars` → expand `env_vars`/`verify_files`. Returns the
/// runtime global plus its own effective allowlist, so group expansion
/// can inherit from it.
pub fn expand_global(spec: &GlobalSpec, system_env: &SystemEnv) -> Result<(RuntimeGlobal, Vec<String>), ConfigError> {
    let declared = EnvAllowlist::from_declared(spec.env_allowlist.clone());
    let allowlist = effective_allowlist(&declared, &[]);

    let imported = import_from_env(&spec.env_import, &allowlist, system_env)?;
    let (expanded_vars, expanded_array_vars) = process_vars(&spec.vars, &HashMap::new(), &HashMap::new(), "global")?;
    let expanded_env = expand_env_vars(&spec.env_vars, &expanded_vars, imported)?;
    let expanded_verify_files = expand_each(&spec.verify_files, &expanded_vars)?;
    for path in &expanded_verify_files {
        require_absolute("global.verify_files", path)?;
    }

    let global = RuntimeGlobal {
        spec: spec.clone(),
        expanded_vars,
        expanded_array_vars,
        expanded_env,
        expanded_verify_files,
        default_timeout: Duration::from_secs(spec.timeout.unwrap_or(0)),
    };
    Ok((global, allowlist))
}

/// `expand_group` (spec §4.9, §4.13 step 1): inherits the global's
/// expanded vars/env as the base for its own `process_vars` call.
/// `cmd_allowed` is fully expanded here since the security validator
/// needs finished absolute paths, not templates.
pub fn expand_group(
    spec: &GroupSpec,
    global: &RuntimeGlobal,
    global_allowlist: &[String],
    system_env: &SystemEnv,
) -> Result<(RuntimeGroup, Vec<String>), ConfigError> {
    let declared = EnvAllowlist::from_declared(spec.env_allowlist.clone());
    let allowlist = effective_allowlist(&declared, global_allowlist);

    let imported = import_from_env(&spec.env_import, &allowlist, system_env)?;
    let (expanded_vars, expanded_array_vars) = process_vars(
        &spec.vars,
        &global.expanded_vars,
        &global.expanded_array_vars,
        &spec.name,
    )?;
    let mut expanded_env = global.expanded_env.clone();
    expanded_env.extend(imported);
    let expanded_env = expand_env_vars(&spec.env_vars, &expanded_vars, expanded_env)?;
    let expanded_verify_files = expand_each(&spec.verify_files, &expanded_vars)?;
    for path in &expanded_verify_files {
        require_absolute(&format!("groups.{}.verify_files", spec.name), path)?;
    }
    let expanded_cmd_allowed = expand_each(&spec.cmd_allowed, &expanded_vars)?;
    for path in &expanded_cmd_allowed {
        require_absolute(&format!("groups.{}.cmd_allowed", spec.name), path)?;
    }
    if let Some(workdir) = &spec.workdir {
        let mut resolver = EagerResolver::new(expanded_vars.clone());
        let expanded_workdir = expand_string(workdir, &mut resolver, &ExpandContext::root())?;
        require_absolute(&format!("groups.{}.workdir", spec.name), &expanded_workdir)?;
    }

    let group = RuntimeGroup {
        spec: spec.clone(),
        expanded_vars,
        expanded_array_vars,
        expanded_env,
        expanded_verify_files,
        expanded_cmd_allowed,
        effective_workdir: String::new(),
        commands: spec.commands.clone(),
    };
    Ok((group, allowlist))
}

/// `expand_command` (spec §4.9, §4.13 step 5a): `runtime_group`'s
/// `expanded_vars` must already carry `__runner_workdir` by the time this
/// is called (injected by the caller after workdir resolution), so
/// command-scope templates may reference it.
pub fn expand_command(
    spec: &CommandSpec,
    group: &RuntimeGroup,
    group_allowlist: &[String],
    system_env: &SystemEnv,
    default_timeout: Duration,
) -> Result<RuntimeCommand, ConfigError> {
    let declared = EnvAllowlist::from_declared(None);
    let allowlist = effective_allowlist(&declared, group_allowlist);

    let imported = import_from_env(&spec.env_import, &allowlist, system_env)?;
    let (expanded_vars, expanded_array_vars) = process_vars(
        &spec.vars,
        &group.expanded_vars,
        &group.expanded_array_vars,
        &spec.name,
    )?;
    let mut expanded_env = group.expanded_env.clone();
    expanded_env.extend(imported);
    let expanded_env = expand_env_vars(&spec.env_vars, &expanded_vars, expanded_env)?;

    let mut cmd_resolver = EagerResolver::new(expanded_vars.clone());
    let expanded_cmd = expand_string(&spec.cmd, &mut cmd_resolver, &ExpandContext::root())?;
    require_absolute(&format!("groups.{}.commands.{}.cmd", group.name(), spec.name), &expanded_cmd)?;

    let expanded_args = expand_each(&spec.args, &expanded_vars)?;

    let effective_workdir = if let Some(workdir) = &spec.workdir {
        let mut resolver = EagerResolver::new(expanded_vars.clone());
        let expanded = expand_string(workdir, &mut resolver, &ExpandContext::root())?;
        require_absolute(&format!("groups.{}.commands.{}.workdir", group.name(), spec.name), &expanded)?;
        expanded
    } else {
        group.effective_workdir.clone()
    };

    let effective_timeout = spec.timeout.map(Duration::from_secs).unwrap_or(default_timeout);

    Ok(RuntimeCommand {
        spec: spec.clone(),
        expanded_vars,
        expanded_array_vars,
        expanded_env,
        expanded_cmd,
        expanded_args,
        effective_timeout,
        effective_workdir,
        effective_output_size_limit: spec.output_size_limit.unwrap_or(u64::MAX),
    })
}
