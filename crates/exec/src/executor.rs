// SPDX-License-Identifier: MIT

//! Process spawning, output capture, and timeout escalation (spec
//! §4.12).

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use scr_core::{CommandResult, ErrorKind, RuntimeCommand};
use scr_privilege::{Gid, PrivilegeManager, Uid};
use scr_security::SecurityValidator;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::error::ExecError;

/// Exit code synthesized for a timed-out command, matching the
/// convention of the coreutils `timeout(1)` wrapper.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Grace period between SIGTERM and SIGKILL during timeout escalation
/// (spec §4.12 step 5: "signal escalation: soft then hard").
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Spawns a single command with a resolved argv/env/cwd, enforces its
/// timeout and output-size bound, and produces a `CommandResult` whose
/// captured output has already passed through the early-redaction layer
/// (`SecurityValidator::sanitize_output_for_logging`).
pub struct Executor {
    validator: Arc<SecurityValidator>,
    privilege: Arc<PrivilegeManager>,
}

impl Executor {
    pub fn new(validator: Arc<SecurityValidator>, privilege: Arc<PrivilegeManager>) -> Self {
        Executor { validator, privilege }
    }

    pub async fn execute(&self, runtime_command: &RuntimeCommand) -> Result<CommandResult, ExecError> {
        let span = tracing::info_span!("execute", command = runtime_command.name());
        let _guard = span.enter();

        let start = Instant::now();
        let mut result = self.execute_inner(runtime_command).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if let Ok(outcome) = &mut result {
            outcome.duration_ms = elapsed_ms;
        }

        match &result {
            Ok(outcome) => tracing::info!(
                elapsed_ms,
                exit_code = outcome.exit_code,
                error_kind = ?outcome.error_kind,
                "command completed"
            ),
            Err(error) => tracing::error!(elapsed_ms, %error, "command failed to run"),
        }

        result
    }

    async fn execute_inner(&self, runtime_command: &RuntimeCommand) -> Result<CommandResult, ExecError> {
        let target_uid = resolve_user(runtime_command.spec.run_as_user.as_deref())?;
        let target_gid = resolve_group(runtime_command.spec.run_as_group.as_deref())?;

        let mut command = Command::new(&runtime_command.expanded_cmd);
        command
            .args(&runtime_command.expanded_args)
            .current_dir(&runtime_command.effective_workdir)
            .env_clear()
            .envs(&runtime_command.expanded_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let spawned = if target_uid.is_some() || target_gid.is_some() {
            self.privilege
                .with_privileges("spawn privileged command", target_uid, target_gid, || command.spawn())?
        } else {
            command.spawn()
        };

        let mut child = spawned.map_err(|source| ExecError::Spawn {
            cmd: runtime_command.expanded_cmd.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = runtime_command.effective_output_size_limit;

        let stdout_task = tokio::spawn(async move {
            match stdout {
                Some(mut pipe) => drain_capped(&mut pipe, limit).await,
                None => Vec::new(),
            }
        });
        let stderr_task = tokio::spawn(async move {
            match stderr {
                Some(mut pipe) => drain_capped(&mut pipe, limit).await,
                None => Vec::new(),
            }
        });

        let timeout = runtime_command.effective_timeout;
        let waited = if timeout.is_zero() {
            Ok(child.wait().await)
        } else {
            tokio::time::timeout(timeout, child.wait()).await
        };

        let (exit_code, error_kind) = match waited {
            Ok(Ok(status)) => (status.code().unwrap_or(-1), None),
            Ok(Err(source)) => {
                return Err(ExecError::Spawn {
                    cmd: runtime_command.expanded_cmd.clone(),
                    source,
                })
            }
            Err(_elapsed) => {
                escalate_kill(&mut child).await;
                (TIMEOUT_EXIT_CODE, Some(ErrorKind::Timeout))
            }
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        let error_kind = error_kind.or(if exit_code != 0 {
            Some(ErrorKind::NonZeroExit)
        } else {
            None
        });

        Ok(CommandResult {
            name: runtime_command.name().to_string(),
            exit_code,
            output: self.validator.sanitize_output_for_logging(&stdout_bytes),
            stderr: self.validator.sanitize_output_for_logging(&stderr_bytes),
            duration_ms: 0,
            error_kind,
        })
    }
}

async fn drain_capped<R>(reader: &mut R, limit: u64) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if (captured.len() as u64) < limit {
                    let remaining = (limit - captured.len() as u64) as usize;
                    let take = remaining.min(n);
                    captured.extend_from_slice(&buf[..take]);
                }
            }
        }
    }
    captured
}

/// Soft-then-hard termination: SIGTERM, a grace window, then SIGKILL if
/// the process is still alive (spec §4.12 step 5).
async fn escalate_kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = kill(nix::unistd::Pid::from_raw(pid as i32), Signal::SIGTERM);
        if tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

fn resolve_user(name: Option<&str>) -> Result<Option<Uid>, ExecError> {
    let Some(name) = name else { return Ok(None) };
    match nix::unistd::User::from_name(name) {
        Ok(Some(user)) => Ok(Some(user.uid)),
        _ => Err(ExecError::UnknownUser(name.to_string())),
    }
}

fn resolve_group(name: Option<&str>) -> Result<Option<Gid>, ExecError> {
    let Some(name) = name else { return Ok(None) };
    match nix::unistd::Group::from_name(name) {
        Ok(Some(group)) => Ok(Some(group.gid)),
        _ => Err(ExecError::UnknownGroup(name.to_string())),
    }
}
