// SPDX-License-Identifier: MIT

//! Per-group orchestration (spec §4.13): expand, resolve the working
//! directory, run each command in order, and abort the group on the
//! first failure.

use std::sync::Arc;

use scr_config::{expand_command, expand_group};
use scr_core::{CommandResult, GroupSpec, RuntimeGlobal};
use scr_envfilter::SystemEnv;
use scr_logging::{LogRecord, RecordKind};
use scr_security::{Attribute, LogValue, SecurityValidator};
use scr_verify::VerificationManager;

use crate::error::{ExecError, GroupError};
use crate::executor::Executor;
use crate::resources::resolve_group_workdir;

/// Wraps a group's command results so the summary record can attach
/// them as a [`scr_security::Attribute::Deferred`] value instead of
/// eagerly Debug-formatting them into a string (spec §4.15).
struct ResultsLogValue(Vec<CommandResult>);

impl LogValue for ResultsLogValue {
    fn produce_log_value(&self) -> Attribute {
        Attribute::Sequence(
            self.0
                .iter()
                .map(|r| {
                    Attribute::Group(vec![
                        ("name".to_string(), Attribute::String(r.name.clone())),
                        ("exit_code".to_string(), Attribute::String(r.exit_code.to_string())),
                        ("succeeded".to_string(), Attribute::String(r.succeeded().to_string())),
                        ("duration_ms".to_string(), Attribute::String(r.duration_ms.to_string())),
                        ("output".to_string(), Attribute::String(r.output.clone())),
                        ("stderr".to_string(), Attribute::String(r.stderr.clone())),
                    ])
                })
                .collect(),
        )
    }
}

pub struct GroupExecutor {
    executor: Executor,
    validator: Arc<SecurityValidator>,
    verification: Arc<VerificationManager>,
    dry_run: bool,
    keep_temp_dirs: bool,
}

impl GroupExecutor {
    pub fn new(
        executor: Executor,
        validator: Arc<SecurityValidator>,
        verification: Arc<VerificationManager>,
        dry_run: bool,
        keep_temp_dirs: bool,
    ) -> Self {
        GroupExecutor {
            executor,
            validator,
            verification,
            dry_run,
            keep_temp_dirs,
        }
    }

    /// Runs every command in `spec` in order, returning the accumulated
    /// results on success. On failure, the error carries whatever
    /// results did complete so the caller can still log the full
    /// sequence (spec §4.13 step 6).
    pub async fn execute_group(
        &self,
        spec: &GroupSpec,
        global: &RuntimeGlobal,
        global_allowlist: &[String],
        system_env: &SystemEnv,
    ) -> Result<Vec<CommandResult>, GroupError> {
        let mut results = Vec::new();
        let outcome = self.run(spec, global, global_allowlist, system_env, &mut results).await;

        // Built and dispatched directly rather than via `tracing::info!`:
        // a `results = ?results` field would Debug-format (and thus
        // irreversibly flatten) every command's output before it ever
        // reached the redactor. Going through `scr_logging::emit`
        // attaches the results as a deferred `LogValue` instead, so
        // redaction sees the structured tree, not a pre-rendered string.
        scr_logging::emit(LogRecord {
            level: tracing::Level::INFO,
            target: module_path!().to_string(),
            kind: RecordKind::GroupSummary,
            message: Some("group execution finished".to_string()),
            fields: vec![
                ("group".to_string(), spec.name.clone()),
                ("commands_run".to_string(), results.len().to_string()),
                ("succeeded".to_string(), outcome.is_ok().to_string()),
            ],
            deferred: vec![(
                "results".to_string(),
                Attribute::Deferred(Arc::new(ResultsLogValue(results.clone()))),
            )],
            slack_requested: true,
        });

        match outcome {
            Ok(()) => Ok(results),
            Err(source) => Err(GroupError {
                group: spec.name.clone(),
                results,
                source,
            }),
        }
    }

    async fn run(
        &self,
        spec: &GroupSpec,
        global: &RuntimeGlobal,
        global_allowlist: &[String],
        system_env: &SystemEnv,
        results: &mut Vec<CommandResult>,
    ) -> Result<(), ExecError> {
        // Step 1: expand_group.
        let (mut runtime_group, group_allowlist) = expand_group(spec, global, global_allowlist, system_env)?;

        // Step 2: resolve_group_workdir.
        let (workdir, tempdir_mgr) =
            resolve_group_workdir(&spec.name, spec.workdir.as_deref(), &runtime_group.expanded_vars, self.dry_run)?;

        // Step 3: register cleanup (scope guard covers every exit path below,
        // including the early `?` returns from validate/verify/execute).
        let keep = self.keep_temp_dirs;
        let _cleanup = tempdir_mgr.map(|mgr| CleanupGuard { mgr, keep });

        // Step 4: inject __runner_workdir.
        runtime_group.effective_workdir = workdir.clone();
        runtime_group.expanded_vars.insert("__runner_workdir".to_string(), workdir);

        // Step 5: run each command in order, stopping at the first failure.
        for command_spec in &spec.commands {
            let runtime_cmd = expand_command(
                command_spec,
                &runtime_group,
                &group_allowlist,
                system_env,
                global.default_timeout,
            )?;

            let max_risk = command_spec.max_risk_level.unwrap_or_default();
            if let Err(violation) = self.validator.validate_command(
                &runtime_cmd.expanded_cmd,
                &runtime_cmd.expanded_args,
                command_spec.run_as_user.as_deref(),
                &runtime_group.expanded_cmd_allowed,
                max_risk,
            ) {
                tracing::error!(
                    kind = "security_alert",
                    slack = true,
                    group = %spec.name,
                    command = %command_spec.name,
                    error = %violation,
                    "command rejected by security validator"
                );
                return Err(violation.into());
            }

            // Verification performs privileged, synchronous filesystem I/O
            // (seteuid + a blocking read of the root-owned hash manifest);
            // running it off the async executor keeps a slow or contended
            // hash directory from stalling the single-threaded runtime.
            let verification = self.verification.clone();
            let cmd_path = runtime_cmd.expanded_cmd.clone();
            let verify_outcome = tokio::task::spawn_blocking(move || verification.verify_path(std::path::Path::new(&cmd_path)))
                .await
                .map_err(|_| ExecError::TaskPanicked(runtime_cmd.expanded_cmd.clone()))?;
            if let Err(error) = &verify_outcome {
                tracing::error!(
                    kind = "pre_execution_error",
                    slack = true,
                    group = %spec.name,
                    command = %command_spec.name,
                    %error,
                    "command rejected before spawn: verification failed"
                );
            }
            verify_outcome?;

            let result = if self.dry_run {
                scr_core::CommandResult {
                    name: runtime_cmd.name().to_string(),
                    exit_code: 0,
                    output: String::new(),
                    stderr: String::new(),
                    duration_ms: 0,
                    error_kind: None,
                }
            } else {
                self.executor.execute(&runtime_cmd).await?
            };
            let failed = !result.succeeded();
            let failure = (result.name.clone(), result.exit_code);
            results.push(result);
            if failed {
                let (name, exit_code) = failure;
                return Err(ExecError::CommandFailed { name, exit_code });
            }
        }

        Ok(())
    }
}

/// RAII guard ensuring a group's temporary working directory is removed
/// on every exit path unless `--keep-temp-dirs` was requested (spec
/// §4.11: "registered with a scope guard").
struct CleanupGuard {
    mgr: crate::resources::TempDirManager,
    keep: bool,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.keep {
            self.mgr.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scr_core::{CommandSpec, GlobalSpec};
    use scr_fsguard::{FileValidator, GroupMembership, SafeFileIo};
    use scr_privilege::PrivilegeManager;
    use scr_security::Redactor;
    use std::time::Duration;
    use tempfile::tempdir;

    fn global() -> RuntimeGlobal {
        RuntimeGlobal {
            spec: GlobalSpec::default(),
            expanded_vars: std::collections::HashMap::new(),
            expanded_array_vars: std::collections::HashMap::new(),
            expanded_env: std::collections::HashMap::new(),
            expanded_verify_files: Vec::new(),
            default_timeout: Duration::from_secs(30),
        }
    }

    fn bare_command(name: &str, cmd: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            name: name.to_string(),
            cmd: cmd.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            workdir: None,
            env_vars: Vec::new(),
            env_import: Vec::new(),
            vars: Default::default(),
            timeout: None,
            run_as_user: None,
            run_as_group: None,
            max_risk_level: None,
            output: None,
            output_size_limit: None,
        }
    }

    fn bare_group(cmd_allowed: &[&str], commands: Vec<CommandSpec>) -> GroupSpec {
        GroupSpec {
            name: "backup".to_string(),
            workdir: None,
            cmd_allowed: cmd_allowed.iter().map(|s| s.to_string()).collect(),
            env_allowlist: None,
            vars: Default::default(),
            env_vars: Vec::new(),
            env_import: Vec::new(),
            verify_files: Vec::new(),
            commands,
        }
    }

    fn group_executor(hash_dir: &std::path::Path) -> GroupExecutor {
        let validator = Arc::new(SecurityValidator::new(Redactor::with_default_patterns(), None));
        let privilege = Arc::new(PrivilegeManager::new());
        let executor = Executor::new(validator.clone(), privilege.clone());
        let io = Arc::new(SafeFileIo::new(Arc::new(GroupMembership::new(Duration::from_secs(30)))));
        let file_validator = FileValidator::new(hash_dir.to_path_buf(), io);
        let verification = Arc::new(VerificationManager::new(file_validator, privilege));
        GroupExecutor::new(executor, validator, verification, false, false)
    }

    fn record(hash_dir: &std::path::Path, paths: &[&str]) {
        let io = Arc::new(SafeFileIo::new(Arc::new(GroupMembership::new(Duration::from_secs(30)))));
        let fv = FileValidator::new(hash_dir.to_path_buf(), io);
        for path in paths {
            fv.record(std::path::Path::new(path)).unwrap();
        }
    }

    #[tokio::test]
    async fn runs_all_commands_in_order_and_returns_their_results() {
        let hash_dir = tempdir().unwrap();
        record(hash_dir.path(), &["/bin/true", "/bin/echo"]);

        let spec = bare_group(
            &["/bin/true", "/bin/echo"],
            vec![
                bare_command("step1", "/bin/true", &[]),
                bare_command("step2", "/bin/echo", &["done"]),
            ],
        );

        let ge = group_executor(hash_dir.path());
        let system_env = SystemEnv::from_map(std::collections::HashMap::new());
        let results = ge.execute_group(&spec, &global(), &[], &system_env).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.succeeded()));
        assert_eq!(results[1].output.trim(), "done");
    }

    #[tokio::test]
    async fn stops_at_first_failing_command_and_never_runs_the_rest() {
        let hash_dir = tempdir().unwrap();
        record(hash_dir.path(), &["/bin/false", "/bin/echo"]);

        let spec = bare_group(
            &["/bin/false", "/bin/echo"],
            vec![
                bare_command("fails", "/bin/false", &[]),
                bare_command("never-runs", "/bin/echo", &["nope"]),
            ],
        );

        let ge = group_executor(hash_dir.path());
        let system_env = SystemEnv::from_map(std::collections::HashMap::new());
        let err = ge.execute_group(&spec, &global(), &[], &system_env).await.unwrap_err();
        assert_eq!(err.results.len(), 1);
        assert!(!err.results[0].succeeded());
        assert!(matches!(err.source, ExecError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn rejects_command_not_in_cmd_allowed() {
        let hash_dir = tempdir().unwrap();
        let spec = bare_group(&["/bin/true"], vec![bare_command("sneaky", "/bin/echo", &[])]);

        let ge = group_executor(hash_dir.path());
        let system_env = SystemEnv::from_map(std::collections::HashMap::new());
        let err = ge.execute_group(&spec, &global(), &[], &system_env).await.unwrap_err();
        assert!(matches!(err.source, ExecError::Security(_)));
        assert!(err.results.is_empty());
    }

    #[tokio::test]
    async fn ephemeral_workdir_is_created_and_injected_as_runner_workdir_var() {
        let hash_dir = tempdir().unwrap();
        record(hash_dir.path(), &["/bin/pwd"]);

        let spec = bare_group(&["/bin/pwd"], vec![bare_command("where", "/bin/pwd", &[])]);

        let ge = group_executor(hash_dir.path());
        let system_env = SystemEnv::from_map(std::collections::HashMap::new());
        let results = ge.execute_group(&spec, &global(), &[], &system_env).await.unwrap();
        assert!(results[0].succeeded());
        assert!(results[0].output.trim().starts_with(std::env::temp_dir().to_string_lossy().as_ref()));
    }
}
