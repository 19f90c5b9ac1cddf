// SPDX-License-Identifier: MIT

use std::path::Path;

use scr_core::{ExitCode, RiskLevel};
use thiserror::Error;

use crate::redactor::Redactor;
use crate::risk_rules::{classify_risk, is_dangerous_root_command};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityViolation {
    #[error("command '{0}' is not an absolute path")]
    NotAbsolute(String),

    #[error("command '{0}' does not exist on disk")]
    DoesNotExist(String),

    #[error("command '{0}' is not present in the group's allowlist")]
    NotAllowlisted(String),

    #[error("command '{cmd}' classified as risk level {actual} exceeds the permitted maximum of {max}")]
    RiskExceeded {
        cmd: String,
        actual: RiskLevel,
        max: RiskLevel,
    },

    #[error("environment variable '{0}' is hard-blocked regardless of allowlist")]
    HardBlockedEnvVar(String),

    #[error("environment variable '{name}' contains a control character or disallowed metacharacter")]
    InvalidEnvironmentValue { name: String },
}

/// Every violation is a security-class failure (spec §7): exit 4.
impl From<&SecurityViolation> for ExitCode {
    fn from(_: &SecurityViolation) -> Self {
        ExitCode::SecurityViolation
    }
}

/// Classifies commands by risk, validates them against a group's
/// allowlist, and sanitizes captured output before it reaches a logging
/// sink (spec §4.4).
pub struct SecurityValidator {
    redactor: Redactor,
    output_truncate_bytes: Option<usize>,
}

impl SecurityValidator {
    pub fn new(redactor: Redactor, output_truncate_bytes: Option<usize>) -> Self {
        SecurityValidator {
            redactor,
            output_truncate_bytes,
        }
    }

    /// `validate_command` (spec §4.4): the command must be an absolute
    /// existing path present in the group's allowlist (exact match after
    /// canonicalization), and its classified risk must not exceed
    /// `max_risk_level`.
    pub fn validate_command(
        &self,
        expanded_cmd: &str,
        expanded_args: &[String],
        run_as_user: Option<&str>,
        group_allowlist: &[String],
        max_risk_level: RiskLevel,
    ) -> Result<RiskLevel, SecurityViolation> {
        let path = Path::new(expanded_cmd);
        if !path.is_absolute() {
            return Err(SecurityViolation::NotAbsolute(expanded_cmd.to_string()));
        }

        let canonical = path
            .canonicalize()
            .map_err(|_| SecurityViolation::DoesNotExist(expanded_cmd.to_string()))?;

        let allowlisted = group_allowlist.iter().any(|allowed| {
            Path::new(allowed)
                .canonicalize()
                .map(|c| c == canonical)
                .unwrap_or(false)
        });
        if !allowlisted {
            return Err(SecurityViolation::NotAllowlisted(expanded_cmd.to_string()));
        }

        let basename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(expanded_cmd);
        let elevated = run_as_user.is_some();
        let risk = classify_risk(basename, expanded_args, elevated);

        if risk > max_risk_level {
            return Err(SecurityViolation::RiskExceeded {
                cmd: expanded_cmd.to_string(),
                actual: risk,
                max: max_risk_level,
            });
        }

        Ok(risk)
    }

    pub fn is_dangerous_root_command(&self, basename: &str) -> bool {
        is_dangerous_root_command(basename)
    }

    /// `sanitize_output_for_logging` (spec §4.4): redact, then optionally
    /// truncate to a byte limit.
    pub fn sanitize_output_for_logging(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        let redacted = self.redactor.redact_text(&text);
        match self.output_truncate_bytes {
            Some(limit) if redacted.len() > limit => {
                let mut end = limit;
                while end > 0 && !redacted.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}... [truncated]", &redacted[..end])
            }
            _ => redacted,
        }
    }

    /// `validate_environment_value` (spec §4.5): `PATH`, `LD_PRELOAD`, and
    /// `LD_LIBRARY_PATH` are hard-blocked regardless of allowlist
    /// configuration; every other value is rejected if it carries a
    /// control character or a shell metacharacter that could alter the
    /// child's behavior if the value is later interpolated into a script.
    pub fn validate_environment_value(name: &str, value: &str) -> Result<(), SecurityViolation> {
        const HARD_BLOCKED: &[&str] = &["PATH", "LD_PRELOAD", "LD_LIBRARY_PATH"];
        if HARD_BLOCKED.contains(&name) {
            return Err(SecurityViolation::HardBlockedEnvVar(name.to_string()));
        }

        const DISALLOWED_METACHARACTERS: &[char] = &['`', '$', ';', '|', '&'];
        if value.chars().any(|c| c.is_control() || DISALLOWED_METACHARACTERS.contains(&c)) {
            return Err(SecurityViolation::InvalidEnvironmentValue { name: name.to_string() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SecurityValidator {
        SecurityValidator::new(Redactor::with_default_patterns(), Some(1024))
    }

    #[test]
    fn rejects_relative_path() {
        let v = validator();
        let err = v
            .validate_command("bin/true", &[], None, &["bin/true".to_string()], RiskLevel::Low)
            .unwrap_err();
        assert!(matches!(err, SecurityViolation::NotAbsolute(_)));
    }

    #[test]
    fn rejects_missing_binary() {
        let v = validator();
        let err = v
            .validate_command(
                "/nonexistent/binary-xyz",
                &[],
                None,
                &["/nonexistent/binary-xyz".to_string()],
                RiskLevel::Low,
            )
            .unwrap_err();
        assert!(matches!(err, SecurityViolation::DoesNotExist(_)));
    }

    #[test]
    fn rejects_command_not_in_allowlist() {
        let v = validator();
        let err = v
            .validate_command("/bin/true", &[], None, &["/bin/false".to_string()], RiskLevel::Low)
            .unwrap_err();
        assert!(matches!(err, SecurityViolation::NotAllowlisted(_)));
    }

    #[test]
    fn rejects_when_risk_exceeds_maximum() {
        let v = validator();
        let err = v
            .validate_command(
                "/bin/true",
                &[],
                Some("root"),
                &["/bin/true".to_string()],
                RiskLevel::Low,
            )
            .unwrap_err();
        assert!(matches!(err, SecurityViolation::RiskExceeded { .. }));
    }

    #[test]
    fn accepts_allowlisted_low_risk_command() {
        let v = validator();
        let risk = v
            .validate_command("/bin/true", &[], None, &["/bin/true".to_string()], RiskLevel::Low)
            .unwrap();
        assert_eq!(risk, RiskLevel::Low);
    }

    #[test]
    fn sanitize_output_redacts_and_truncates() {
        let v = SecurityValidator::new(Redactor::with_default_patterns(), Some(10));
        let out = v.sanitize_output_for_logging(b"0123456789ABCDEF");
        assert!(out.starts_with("0123456789"));
        assert!(out.ends_with("[truncated]"));
    }

    #[test]
    fn hard_blocked_env_vars_are_rejected() {
        assert!(matches!(
            SecurityValidator::validate_environment_value("LD_PRELOAD", "/evil.so"),
            Err(SecurityViolation::HardBlockedEnvVar(_))
        ));
        assert!(matches!(
            SecurityValidator::validate_environment_value("PATH", "/evil:/usr/bin"),
            Err(SecurityViolation::HardBlockedEnvVar(_))
        ));
        assert!(SecurityValidator::validate_environment_value("MY_VAR", "ok").is_ok());
    }

    #[test]
    fn control_characters_in_value_are_rejected() {
        assert!(matches!(
            SecurityValidator::validate_environment_value("MY_VAR", "line1\nline2"),
            Err(SecurityViolation::InvalidEnvironmentValue { .. })
        ));
    }

    #[test]
    fn shell_metacharacters_in_value_are_rejected() {
        assert!(matches!(
            SecurityValidator::validate_environment_value("MY_VAR", "ok; rm -rf /"),
            Err(SecurityViolation::InvalidEnvironmentValue { .. })
        ));
        assert!(matches!(
            SecurityValidator::validate_environment_value("MY_VAR", "$(whoami)"),
            Err(SecurityViolation::InvalidEnvironmentValue { .. })
        ));
    }
}
