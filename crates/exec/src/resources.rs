// SPDX-License-Identifier: MIT

//! Ephemeral per-group working directories (spec §4.11).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use scr_expand::{expand_string, EagerResolver, ExpandContext};

use crate::error::WorkdirError;

/// Owns a group's auto-created working directory and guarantees it is
/// only ever removed through `cleanup()`, never on drop — the caller
/// decides when that happens (after the group's last command, or not at
/// all under `--keep-temp-dirs`).
pub struct TempDirManager {
    path: PathBuf,
    dry_run: bool,
}

impl TempDirManager {
    /// `create()` (spec §4.11): `mkdtemp`-style directory under the OS
    /// temp base, `chmod 0700`. In dry-run mode, synthesizes a path
    /// without touching the filesystem.
    pub fn create(group_name: &str, dry_run: bool) -> Result<Self, WorkdirError> {
        if dry_run {
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let path = std::env::temp_dir().join(format!("scr-{group_name}-dryrun-{stamp}"));
            return Ok(TempDirManager { path, dry_run: true });
        }

        let dir = tempfile::Builder::new()
            .prefix(&format!("scr-{group_name}-"))
            .tempdir_in(std::env::temp_dir())
            .map_err(|source| WorkdirError::Create {
                group: group_name.to_string(),
                source,
            })?;
        let path = dir.into_path();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).map_err(|source| {
                WorkdirError::Permissions {
                    path: path.display().to_string(),
                    source,
                }
            })?;
        }

        Ok(TempDirManager { path, dry_run: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `cleanup()` (spec §4.11): recursive removal. Failures are logged,
    /// not propagated — a stale temp directory is not a command failure.
    pub fn cleanup(&self) {
        if self.dry_run {
            return;
        }
        if let Err(error) = std::fs::remove_dir_all(&self.path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::error!(path = %self.path.display(), %error, "failed to remove temporary directory");
            }
        }
    }
}

fn rejects_parent_ref(location: &str, value: &str) -> Result<(), WorkdirError> {
    if value.split('/').any(|segment| segment == "..") {
        return Err(WorkdirError::ContainsParentRef {
            location: location.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn require_absolute(location: &str, value: &str) -> Result<(), WorkdirError> {
    if !value.starts_with('/') {
        return Err(WorkdirError::NotAbsolute {
            location: location.to_string(),
            value: value.to_string(),
        });
    }
    rejects_parent_ref(location, value)
}

/// `resolve_group_workdir` (spec §4.11): an explicit `workdir` template
/// is expanded against the group's already-expanded vars (which do not
/// yet carry `__runner_workdir` — it doesn't exist until this call
/// returns) and used verbatim; otherwise an ephemeral directory is
/// created and owned by the returned manager.
pub fn resolve_group_workdir(
    group_name: &str,
    workdir_template: Option<&str>,
    expanded_vars: &HashMap<String, String>,
    dry_run: bool,
) -> Result<(String, Option<TempDirManager>), WorkdirError> {
    match workdir_template {
        Some(template) if !template.is_empty() => {
            let location = format!("groups.{group_name}.workdir");
            let mut resolver = EagerResolver::new(expanded_vars.clone());
            let expanded =
                expand_string(template, &mut resolver, &ExpandContext::root()).map_err(|source| WorkdirError::Expand {
                    location: location.clone(),
                    source,
                })?;
            require_absolute(&location, &expanded)?;
            Ok((expanded, None))
        }
        _ => {
            let mgr = TempDirManager::create(group_name, dry_run)?;
            let path = mgr.path().display().to_string();
            Ok((path, Some(mgr)))
        }
    }
}

/// `resolve_command_workdir` (spec §4.11): a command-level `workdir`
/// overrides the group's effective directory; otherwise the command
/// inherits it.
pub fn resolve_command_workdir(
    group_name: &str,
    command_name: &str,
    declared_workdir: Option<&str>,
    group_effective_workdir: &str,
) -> Result<String, WorkdirError> {
    match declared_workdir {
        Some(workdir) if !workdir.is_empty() => {
            require_absolute(&format!("groups.{group_name}.commands.{command_name}.workdir"), workdir)?;
            Ok(workdir.to_string())
        }
        _ => Ok(group_effective_workdir.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_synthesizes_without_touching_disk() {
        let mgr = TempDirManager::create("backup", true).unwrap();
        assert!(!mgr.path().exists());
        assert!(mgr.path().to_string_lossy().contains("scr-backup-dryrun-"));
    }

    #[test]
    fn real_create_makes_a_0700_directory() {
        let mgr = TempDirManager::create("backup", false).unwrap();
        assert!(mgr.path().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(mgr.path()).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }

        mgr.cleanup();
        assert!(!mgr.path().exists());
    }

    #[test]
    fn cleanup_on_already_missing_directory_does_not_panic() {
        let mgr = TempDirManager::create("backup", false).unwrap();
        std::fs::remove_dir_all(mgr.path()).unwrap();
        mgr.cleanup();
    }

    #[test]
    fn explicit_workdir_is_used_verbatim() {
        let (path, mgr) = resolve_group_workdir("backup", Some("/var/backups"), &HashMap::new(), false).unwrap();
        assert_eq!(path, "/var/backups");
        assert!(mgr.is_none());
    }

    #[test]
    fn explicit_workdir_template_is_expanded_against_group_vars() {
        let mut vars = HashMap::new();
        vars.insert("base".to_string(), "/srv".to_string());
        let (path, mgr) = resolve_group_workdir("backup", Some("%{base}/backups"), &vars, false).unwrap();
        assert_eq!(path, "/srv/backups");
        assert!(mgr.is_none());
    }

    #[test]
    fn missing_workdir_creates_ephemeral_directory() {
        let (path, mgr) = resolve_group_workdir("backup", None, &HashMap::new(), true).unwrap();
        assert!(path.contains("scr-backup-dryrun-"));
        assert!(mgr.is_some());
    }

    #[test]
    fn relative_group_workdir_is_rejected() {
        let err = resolve_group_workdir("backup", Some("relative"), &HashMap::new(), true).unwrap_err();
        assert!(matches!(err, WorkdirError::NotAbsolute { .. }));
    }

    #[test]
    fn parent_ref_in_group_workdir_is_rejected() {
        let err = resolve_group_workdir("backup", Some("/var/../etc"), &HashMap::new(), true).unwrap_err();
        assert!(matches!(err, WorkdirError::ContainsParentRef { .. }));
    }

    #[test]
    fn command_workdir_falls_back_to_group_effective_workdir() {
        let resolved = resolve_command_workdir("backup", "dump", None, "/tmp/scr-backup-abc").unwrap();
        assert_eq!(resolved, "/tmp/scr-backup-abc");
    }

    #[test]
    fn command_workdir_override_is_validated() {
        let resolved = resolve_command_workdir("backup", "dump", Some("/srv/dump"), "/tmp/scr-backup-abc").unwrap();
        assert_eq!(resolved, "/srv/dump");
    }
}
