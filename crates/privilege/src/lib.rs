// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-privilege: scoped euid/egid elevation with guaranteed restoration
//! (spec §4.6).
//!
//! ```text
//! Unprivileged ──elevate──▶ Elevated ──restore──▶ Unprivileged
//!      │                       │
//!      │                       └──restore_failure──▶ [EmergencyShutdown]
//!      └──elevate_failure────────────────────────────▶ Unprivileged (error)
//! ```
//!
//! Restore failure is never returned to the caller: it logs at
//! `critical`, records a metric, and aborts the process. There is no
//! code path that lets a command run with a stale, half-restored euid.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use nix::unistd::{setegid, seteuid};
use parking_lot::Mutex;
use scr_core::ExitCode;
use thiserror::Error;

pub use nix::unistd::{Gid, Uid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeState {
    Unprivileged,
    Elevated,
    EmergencyShutdown,
}

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("an earlier privilege restore failed; the process is in emergency shutdown")]
    ShutdownInProgress,

    #[error("failed to elevate privileges ({reason}): {source}")]
    ElevationFailed {
        reason: String,
        source: nix::errno::Errno,
    },
}

impl From<&PrivilegeError> for ExitCode {
    fn from(err: &PrivilegeError) -> Self {
        match err {
            PrivilegeError::ElevationFailed { .. } => ExitCode::SecurityViolation,
            // A prior restore failure already aborted the process; reaching
            // here at all means a caller swallowed that abort somehow.
            PrivilegeError::ShutdownInProgress => ExitCode::Internal,
        }
    }
}

#[derive(Default)]
struct Metrics {
    elevation_success: AtomicU64,
    elevation_failure: AtomicU64,
    restore_success: AtomicU64,
    restore_failure: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub elevation_success: u64,
    pub elevation_failure: u64,
    pub restore_success: u64,
    pub restore_failure: u64,
}

impl MetricsSnapshot {
    /// Running success rate over elevation attempts only (restore
    /// failures are fatal and don't get a "rate" — there's no process
    /// left to observe it).
    pub fn elevation_success_rate(&self) -> f64 {
        let total = self.elevation_success + self.elevation_failure;
        if total == 0 {
            1.0
        } else {
            self.elevation_success as f64 / total as f64
        }
    }
}

/// Serializes every elevation scope in the process: no two commands can
/// hold elevated credentials at once.
pub struct PrivilegeManager {
    state: Mutex<PrivilegeState>,
    metrics: Metrics,
}

impl Default for PrivilegeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeManager {
    pub fn new() -> Self {
        PrivilegeManager {
            state: Mutex::new(PrivilegeState::Unprivileged),
            metrics: Metrics::default(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elevation_success: self.metrics.elevation_success.load(Ordering::Relaxed),
            elevation_failure: self.metrics.elevation_failure.load(Ordering::Relaxed),
            restore_success: self.metrics.restore_success.load(Ordering::Relaxed),
            restore_failure: self.metrics.restore_failure.load(Ordering::Relaxed),
        }
    }

    /// Run `f` with the process's effective UID/GID elevated to root and
    /// then dropped to `target_uid`/`target_gid` (whichever are given),
    /// restoring the original credentials unconditionally afterward.
    ///
    /// `target_uid`/`target_gid` of `None` leaves that credential
    /// untouched — e.g. a hash-manifest read only needs `seteuid(0)`.
    pub fn with_privileges<R>(
        &self,
        reason: &str,
        target_uid: Option<Uid>,
        target_gid: Option<Gid>,
        f: impl FnOnce() -> R,
    ) -> Result<R, PrivilegeError> {
        let mut state = self.state.lock();
        if *state == PrivilegeState::EmergencyShutdown {
            return Err(PrivilegeError::ShutdownInProgress);
        }

        let original_euid = nix::unistd::geteuid();
        let original_egid = nix::unistd::getegid();

        tracing::info!(reason, "elevating privileges");

        if let Err(source) = seteuid(Uid::from_raw(0)) {
            self.metrics.elevation_failure.fetch_add(1, Ordering::Relaxed);
            return Err(PrivilegeError::ElevationFailed {
                reason: reason.to_string(),
                source,
            });
        }

        if let Some(gid) = target_gid {
            if let Err(source) = setegid(gid) {
                self.metrics.elevation_failure.fetch_add(1, Ordering::Relaxed);
                self.restore_or_abort(original_euid, original_egid, &mut state);
                return Err(PrivilegeError::ElevationFailed {
                    reason: reason.to_string(),
                    source,
                });
            }
        }

        if let Some(uid) = target_uid {
            if let Err(source) = seteuid(uid) {
                self.metrics.elevation_failure.fetch_add(1, Ordering::Relaxed);
                self.restore_or_abort(original_euid, original_egid, &mut state);
                return Err(PrivilegeError::ElevationFailed {
                    reason: reason.to_string(),
                    source,
                });
            }
        }

        self.metrics.elevation_success.fetch_add(1, Ordering::Relaxed);
        *state = PrivilegeState::Elevated;

        // A panic inside `f` must not unwind past the restore below — that
        // would leave the process's euid/egid elevated with no further code
        // on the stack to drop them back down (spec §9: "acquire → run →
        // guaranteed release on every exit path").
        let result = catch_unwind(AssertUnwindSafe(f));

        self.restore_or_abort(original_euid, original_egid, &mut state);

        match result {
            Ok(value) => Ok(value),
            Err(payload) => resume_unwind(payload),
        }
    }

    /// Unconditional scope-guard restore. Failure here is fatal: log
    /// critical, record the metric, and abort — a half-restored euid
    /// must never be allowed to run another command.
    fn restore_or_abort(&self, original_euid: Uid, original_egid: Gid, state: &mut PrivilegeState) {
        let restored = seteuid(Uid::from_raw(0))
            .and_then(|_| setegid(original_egid))
            .and_then(|_| seteuid(original_euid));

        match restored {
            Ok(()) => {
                self.metrics.restore_success.fetch_add(1, Ordering::Relaxed);
                *state = PrivilegeState::Unprivileged;
            }
            Err(source) => {
                self.metrics.restore_failure.fetch_add(1, Ordering::Relaxed);
                *state = PrivilegeState::EmergencyShutdown;
                tracing::error!(
                    error = %source,
                    kind = "privilege_escalation_failure",
                    slack = true,
                    "CRITICAL: failed to restore original privileges after an elevation scope; aborting process"
                );
                std::process::abort();
            }
        }
    }

    pub fn current_state(&self) -> PrivilegeState {
        *self.state.lock()
    }
}
