// SPDX-License-Identifier: MIT

//! Top-level orchestrator (spec §4.14): load + verify config, then run
//! every group in declared order, halting on the first group failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use scr_config::LoadedConfig;
use scr_envfilter::SystemEnv;
use scr_exec::{Executor, GroupExecutor};
use scr_fsguard::{FileValidator, GroupMembership, SafeFileIo};
use scr_privilege::PrivilegeManager;
use scr_security::{Redactor, SecurityValidator};
use scr_verify::VerificationManager;

use crate::cli::Cli;
use crate::error::RunnerError;

const DEFAULT_HASH_DIR: &str = "/var/lib/scr-runner/hashes";
const GROUP_MEMBERSHIP_TTL: Duration = Duration::from_secs(30);

pub struct Runner {
    cli: Cli,
}

impl Runner {
    pub fn new(cli: Cli) -> Self {
        Runner { cli }
    }

    pub async fn run(&self) -> Result<(), RunnerError> {
        let loaded = scr_config::load(&self.cli.config)?;

        let hash_dir = self.cli.hash_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_HASH_DIR));
        let system_env = SystemEnv::snapshot();

        let validator = Arc::new(SecurityValidator::new(Redactor::with_default_patterns(), None));
        let privilege = Arc::new(PrivilegeManager::new());
        let membership = Arc::new(GroupMembership::new(GROUP_MEMBERSHIP_TTL));
        let io = Arc::new(SafeFileIo::new(membership));
        let file_validator = FileValidator::new(hash_dir, io);
        let verification = Arc::new(VerificationManager::new(file_validator, privilege.clone()));

        verify_before_execution(verification.clone(), &self.cli.config, &loaded).await?;

        let executor = Executor::new(validator.clone(), privilege.clone());
        let group_executor =
            GroupExecutor::new(executor, validator, verification, self.cli.dry_run, self.cli.keep_temp_dirs);

        for group in &loaded.spec.groups {
            tracing::info!(group = %group.name, "starting group");
            group_executor
                .execute_group(group, &loaded.global, &loaded.global_allowlist, &system_env)
                .await?;
        }

        Ok(())
    }
}

/// Verifies the config file itself plus every global `verify_files`
/// entry before any group starts (spec §4.14 step 3). Runs on a
/// blocking task since verification performs privileged, synchronous
/// filesystem I/O, same rationale as `GroupExecutor`'s per-command call.
async fn verify_before_execution(
    verification: Arc<VerificationManager>,
    config_path: &Path,
    loaded: &LoadedConfig,
) -> Result<(), RunnerError> {
    let mut paths = vec![config_path.to_string_lossy().to_string()];
    paths.extend(loaded.global.expanded_verify_files.iter().cloned());

    tokio::task::spawn_blocking(move || verification.verify_all(paths.iter().map(String::as_str)))
        .await
        .map_err(|_| RunnerError::TaskPanicked("verify_before_execution".to_string()))??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scr_fsguard::FileValidator as Fv;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn cli(config: PathBuf, hash_dir: PathBuf) -> Cli {
        Cli {
            config,
            hash_dir: Some(hash_dir),
            dry_run: false,
            keep_temp_dirs: false,
            log_level: "info".to_string(),
            log_file: std::env::temp_dir().join("scr-runner-test.log"),
            quiet: true,
        }
    }

    #[tokio::test]
    async fn runs_a_minimal_config_end_to_end() {
        let workdir = tempdir().unwrap();
        let hash_dir = tempdir().unwrap();
        let config_path = write_config(
            workdir.path(),
            r#"
                version = "1"
                [[groups]]
                name = "backup"
                cmd_allowed = ["/bin/true"]
                [[groups.commands]]
                name = "step"
                cmd = "/bin/true"
            "#,
        );

        let io = Arc::new(SafeFileIo::new(Arc::new(GroupMembership::new(GROUP_MEMBERSHIP_TTL))));
        let fv = Fv::new(hash_dir.path().to_path_buf(), io);
        fv.record(&config_path).unwrap();
        fv.record(Path::new("/bin/true")).unwrap();

        let runner = Runner::new(cli(config_path, hash_dir.path().to_path_buf()));
        assert!(runner.run().await.is_ok());
    }

    #[tokio::test]
    async fn halts_with_verification_failure_when_config_hash_is_unrecorded() {
        let workdir = tempdir().unwrap();
        let hash_dir = tempdir().unwrap();
        let config_path = write_config(
            workdir.path(),
            r#"
                version = "1"
            "#,
        );

        let runner = Runner::new(cli(config_path, hash_dir.path().to_path_buf()));
        let err = runner.run().await.unwrap_err();
        assert_eq!(err.exit_code(), scr_core::ExitCode::VerificationFailure);
    }

    #[tokio::test]
    async fn halts_at_the_first_failing_group() {
        let workdir = tempdir().unwrap();
        let hash_dir = tempdir().unwrap();
        let config_path = write_config(
            workdir.path(),
            r#"
                version = "1"
                [[groups]]
                name = "fails"
                cmd_allowed = ["/bin/false"]
                [[groups.commands]]
                name = "step"
                cmd = "/bin/false"
            "#,
        );

        let io = Arc::new(SafeFileIo::new(Arc::new(GroupMembership::new(GROUP_MEMBERSHIP_TTL))));
        let fv = Fv::new(hash_dir.path().to_path_buf(), io);
        fv.record(&config_path).unwrap();
        fv.record(Path::new("/bin/false")).unwrap();

        let runner = Runner::new(cli(config_path, hash_dir.path().to_path_buf()));
        let err = runner.run().await.unwrap_err();
        assert_eq!(err.exit_code(), scr_core::ExitCode::CommandFailure);
    }
}
