// SPDX-License-Identifier: MIT

use scr_core::RiskLevel;

/// Commands whose basename is a deny-hint for destructive or
/// system-altering behavior (spec §4.4).
const DANGEROUS_ROOT_BASENAMES: &[&str] = &[
    "rm", "dd", "mkfs", "fdisk", "parted", "shutdown", "reboot", "halt", "format", "shred",
    "wipefs", "systemctl", "crontab", "visudo", "userdel", "groupdel", "passwd", "chpasswd",
];

/// Argument tokens that, combined with a dangerous basename under
/// elevation, raise risk to `Critical`.
const ESCALATING_FLAGS: &[&str] = &["-r", "-R", "-f", "-rf", "-fr", "--recursive", "--force"];

const SYSTEM_CRITICAL_PREFIXES: &[&str] = &["/etc", "/boot", "/sys", "/proc", "/dev"];

pub fn is_dangerous_root_command(basename: &str) -> bool {
    DANGEROUS_ROOT_BASENAMES.contains(&basename)
}

fn has_escalating_flag(args: &[String]) -> bool {
    args.iter().any(|a| ESCALATING_FLAGS.contains(&a.as_str()))
}

fn has_wildcard(args: &[String]) -> bool {
    args.iter().any(|a| a.contains('*') || a.contains('?'))
}

fn targets_system_critical_path(args: &[String]) -> bool {
    args.iter()
        .any(|a| SYSTEM_CRITICAL_PREFIXES.iter().any(|prefix| a.starts_with(prefix)))
}

/// A single row of the risk decision table: if `matches` holds for the
/// command under classification, it is assigned at least `level`.
/// Evaluated in order; the final level is the maximum over every matching
/// row (spec §9: "treat the risk classifier as a policy module with an
/// explicit decision table").
struct RiskRule {
    description: &'static str,
    matches: fn(&str, &[String], bool) -> bool,
    level: RiskLevel,
}

fn decision_table() -> &'static [RiskRule] {
    &[
        RiskRule {
            description: "elevated dangerous-root command with a recursive/force flag",
            matches: |basename, args, elevated| {
                elevated && is_dangerous_root_command(basename) && has_escalating_flag(args)
            },
            level: RiskLevel::Critical,
        },
        RiskRule {
            description: "elevated dangerous-root command with a wildcard argument",
            matches: |basename, args, elevated| {
                elevated && is_dangerous_root_command(basename) && has_wildcard(args)
            },
            level: RiskLevel::Critical,
        },
        RiskRule {
            description: "elevated dangerous-root command targeting a system-critical path",
            matches: |basename, args, elevated| {
                elevated && is_dangerous_root_command(basename) && targets_system_critical_path(args)
            },
            level: RiskLevel::Critical,
        },
        RiskRule {
            description: "dangerous-root command without elevation-specific escalators",
            matches: |basename, _args, _elevated| is_dangerous_root_command(basename),
            level: RiskLevel::High,
        },
        RiskRule {
            description: "any command run under privilege elevation",
            matches: |_basename, _args, elevated| elevated,
            level: RiskLevel::Medium,
        },
    ]
}

/// Classify a command's risk level from its basename, argument vector,
/// and whether it runs under privilege elevation.
///
/// Unmatched commands default to `Low`. Note this differs from
/// `RiskLevel::default()` (`High`), which is the fail-secure value used
/// when classification cannot run at all — here we *did* run the table
/// and nothing matched.
pub fn classify_risk(basename: &str, args: &[String], elevated: bool) -> RiskLevel {
    decision_table()
        .iter()
        .filter(|rule| (rule.matches)(basename, args, elevated))
        .map(|rule| rule.level)
        .max()
        .unwrap_or(RiskLevel::Low)
}
