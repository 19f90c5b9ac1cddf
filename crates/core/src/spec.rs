// SPDX-License-Identifier: MIT

//! Load-time configuration spec (spec §3, §6). These types are the direct
//! target of `toml::from_str` in `scr-config`; `deny_unknown_fields` is what
//! makes removed fields (`temp_dir`, `Global.workdir`, `Command.dir`) fail
//! loudly instead of being silently ignored.

use crate::risk::RiskLevel;
use crate::vars::VarValue;
use serde::Deserialize;
use std::collections::BTreeMap;

/// How a scope's environment allowlist composes with its parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InheritMode {
    /// Use the parent's allowlist verbatim (the scope declared none).
    #[default]
    Inherit,
    /// The scope's own list is used, the parent's is ignored entirely.
    Override,
    /// The scope explicitly declared an empty list: nothing is inherited.
    Clear,
}

/// An environment-variable name allowlist plus its inheritance mode.
#[derive(Debug, Clone, Default)]
pub struct EnvAllowlist {
    pub names: Vec<String>,
    pub mode: InheritMode,
}

impl EnvAllowlist {
    /// Build an allowlist from an optional TOML-declared list. `None` means
    /// the scope didn't declare one (inherit); `Some(vec![])` means the
    /// scope explicitly declared an empty list (clear); `Some(non_empty)`
    /// means the scope's own list overrides the parent's.
    pub fn from_declared(declared: Option<Vec<String>>) -> Self {
        match declared {
            None => EnvAllowlist {
                names: Vec::new(),
                mode: InheritMode::Inherit,
            },
            Some(names) if names.is_empty() => EnvAllowlist {
                names,
                mode: InheritMode::Clear,
            },
            Some(names) => EnvAllowlist {
                names,
                mode: InheritMode::Override,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSpec {
    pub version: String,
    #[serde(default)]
    pub global: GlobalSpec,
    #[serde(rename = "groups", default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSpec {
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub verify_files: Vec<String>,
    #[serde(default)]
    pub env_allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub env_vars: Vec<String>,
    #[serde(default)]
    pub env_import: Vec<String>,
    #[serde(default)]
    pub vars: BTreeMap<String, VarValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub cmd_allowed: Vec<String>,
    #[serde(default)]
    pub env_allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub vars: BTreeMap<String, VarValue>,
    #[serde(default)]
    pub env_vars: Vec<String>,
    #[serde(default)]
    pub env_import: Vec<String>,
    #[serde(default)]
    pub verify_files: Vec<String>,
    #[serde(rename = "commands", default)]
    pub commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    pub name: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub env_vars: Vec<String>,
    #[serde(default)]
    pub env_import: Vec<String>,
    #[serde(default)]
    pub vars: BTreeMap<String, VarValue>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub run_as_user: Option<String>,
    #[serde(default)]
    pub run_as_group: Option<String>,
    #[serde(default)]
    pub max_risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub output_size_limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses() {
        let toml = r#"
            version = "1"

            [[groups]]
            name = "backup"

            [[groups.commands]]
            name = "dump"
            cmd = "/usr/bin/pg_dump"
        "#;
        let spec: ConfigSpec = toml::from_str(toml).unwrap();
        assert_eq!(spec.version, "1");
        assert_eq!(spec.groups.len(), 1);
        assert_eq!(spec.groups[0].commands[0].cmd, "/usr/bin/pg_dump");
    }

    #[test]
    fn unknown_global_field_is_rejected() {
        let toml = r#"
            version = "1"
            [global]
            workdir = "/tmp"
        "#;
        let result: Result<ConfigSpec, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_group_field_temp_dir_is_rejected() {
        let toml = r#"
            version = "1"
            [[groups]]
            name = "g"
            temp_dir = true
        "#;
        let result: Result<ConfigSpec, _> = toml::from_str(toml);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("temp_dir"), "error was: {err}");
    }

    #[test]
    fn unknown_command_field_dir_is_rejected() {
        let toml = r#"
            version = "1"
            [[groups]]
            name = "g"
            [[groups.commands]]
            name = "c"
            cmd = "/bin/true"
            dir = "/tmp"
        "#;
        let result: Result<ConfigSpec, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn array_var_parses() {
        let toml = r#"
            version = "1"
            [global.vars]
            base_dir = "/opt"
            files = ["a", "b"]
        "#;
        let spec: ConfigSpec = toml::from_str(toml).unwrap();
        match spec.global.vars.get("files").unwrap() {
            VarValue::Array(items) => assert_eq!(items, &["a".to_string(), "b".to_string()]),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn clear_mode_from_empty_declared_list() {
        let a = EnvAllowlist::from_declared(Some(vec![]));
        assert_eq!(a.mode, InheritMode::Clear);
        let b = EnvAllowlist::from_declared(None);
        assert_eq!(b.mode, InheritMode::Inherit);
        let c = EnvAllowlist::from_declared(Some(vec!["PATH".into()]));
        assert_eq!(c.mode, InheritMode::Override);
    }
}
