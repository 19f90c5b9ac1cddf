// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-config: TOML loading, structural validation, and the
//! global/group/command expansion pipeline (spec §4.9).

mod error;
mod legacy;
mod loader;

pub use error::ConfigError;
pub use loader::{expand_command, expand_global, expand_group, load, load_str, LoadedConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_loads_and_expands_globally() {
        let toml = r#"
            version = "1"

            [global.vars]
            name = "world"

            [global]
            env_vars = ["GREETING=hello %{name}"]

            [[groups]]
            name = "backup"

            [[groups.commands]]
            name = "dump"
            cmd = "/usr/bin/pg_dump"
        "#;
        let loaded = load_str(toml).unwrap();
        assert_eq!(loaded.global.expanded_env.get("GREETING").unwrap(), "hello world");
    }

    #[test]
    fn rejects_unknown_global_field() {
        let toml = r#"
            version = "1"
            [global]
            workdir = "/tmp"
        "#;
        let err = load_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_duplicate_group_names() {
        let toml = r#"
            version = "1"
            [[groups]]
            name = "dup"
            [[groups.commands]]
            name = "a"
            cmd = "/bin/true"
            [[groups]]
            name = "dup"
            [[groups.commands]]
            name = "b"
            cmd = "/bin/true"
        "#;
        let err = load_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateGroupName(name) if name == "dup"));
    }

    #[test]
    fn rejects_legacy_vars_array_with_migration_hint() {
        let toml = r#"
            version = "1"
            [global]
            vars = ["k=v"]
        "#;
        let err = load_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::LegacyVarsSyntax { .. }));
    }

    #[test]
    fn rejects_relative_verify_file_path() {
        let toml = r#"
            version = "1"
            [global]
            verify_files = ["relative/path"]
        "#;
        let err = load_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::NotAbsolute { .. }));
    }

    #[test]
    fn rejects_hard_blocked_env_var_in_env_vars() {
        let toml = r#"
            version = "1"
            [global]
            env_vars = ["LD_PRELOAD=/tmp/evil.so"]
        "#;
        let err = load_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Security(scr_security::SecurityViolation::HardBlockedEnvVar(name)) if name == "LD_PRELOAD"));
    }

    #[test]
    fn rejects_env_var_value_with_shell_metacharacter() {
        let toml = r#"
            version = "1"
            [global]
            env_vars = ["GREETING=hello; rm -rf /"]
        "#;
        let err = load_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Security(scr_security::SecurityViolation::InvalidEnvironmentValue { .. })));
    }
}
