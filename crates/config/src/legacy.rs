// SPDX-License-Identifier: MIT

use crate::error::ConfigError;

/// Detect the pre-table `vars = ["k=v", ...]` syntax before the strict
/// `deny_unknown_fields` parse runs, so the failure carries a migration
/// hint instead of a generic "invalid type" message (spec §4.9).
pub fn detect_legacy_vars(raw: &str) -> Result<(), ConfigError> {
    let value: toml::Value = toml::from_str(raw).map_err(ConfigError::Parse)?;

    if is_legacy_array(value.get("global").and_then(|g| g.get("vars"))) {
        return Err(ConfigError::LegacyVarsSyntax {
            location: "global".to_string(),
        });
    }

    if let Some(toml::Value::Array(groups)) = value.get("groups") {
        for (gi, group) in groups.iter().enumerate() {
            if is_legacy_array(group.get("vars")) {
                return Err(ConfigError::LegacyVarsSyntax {
                    location: format!("groups[{gi}]"),
                });
            }
            if let Some(toml::Value::Array(commands)) = group.get("commands") {
                for (ci, command) in commands.iter().enumerate() {
                    if is_legacy_array(command.get("vars")) {
                        return Err(ConfigError::LegacyVarsSyntax {
                            location: format!("groups[{gi}].commands[{ci}]"),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

fn is_legacy_array(vars_value: Option<&toml::Value>) -> bool {
    matches!(vars_value, Some(toml::Value::Array(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_table_form() {
        let toml = r#"
            version = "1"
            [global.vars]
            greeting = "hi"
        "#;
        assert!(detect_legacy_vars(toml).is_ok());
    }

    #[test]
    fn rejects_legacy_global_array_form() {
        let toml = r#"
            version = "1"
            [global]
            vars = ["k=v"]
        "#;
        let err = detect_legacy_vars(toml).unwrap_err();
        assert!(matches!(err, ConfigError::LegacyVarsSyntax { location } if location == "global"));
    }

    #[test]
    fn rejects_legacy_command_array_form() {
        let toml = r#"
            version = "1"
            [[groups]]
            name = "g"
            [[groups.commands]]
            name = "c"
            cmd = "/bin/true"
            vars = ["k=v"]
        "#;
        let err = detect_legacy_vars(toml).unwrap_err();
        assert!(matches!(err, ConfigError::LegacyVarsSyntax { location } if location == "groups[0].commands[0]"));
    }
}
