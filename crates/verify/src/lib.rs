// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! scr-verify: orchestrates hash-manifest verification of config files and
//! referenced binaries before anything is spawned (spec §4.10).

use std::path::Path;
use std::sync::Arc;

use scr_core::ExitCode;
use scr_fsguard::{FileValidator, ManifestError, SafeIoError};
use scr_privilege::{PrivilegeManager, Uid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("'{path}' has been modified since it was recorded")]
    FileModified { path: String },

    #[error("'{path}' no longer exists")]
    FileMissing { path: String },

    #[error("no hash-manifest entry for '{path}'")]
    HashFileMissing { path: String },

    #[error("could not read '{path}' under elevated privileges: {reason}")]
    AccessFailed { path: String, reason: String },

    #[error("failed to elevate privileges for verification: {0}")]
    ElevationFailed(String),
}

impl From<&VerificationError> for ExitCode {
    fn from(err: &VerificationError) -> Self {
        match err {
            VerificationError::FileModified { .. }
            | VerificationError::FileMissing { .. }
            | VerificationError::HashFileMissing { .. } => ExitCode::VerificationFailure,
            VerificationError::AccessFailed { .. } | VerificationError::ElevationFailed(_) => {
                ExitCode::SecurityViolation
            }
        }
    }
}

/// Holds a reference to the (root-owned, `0700`) hash directory and
/// performs every verification read under a privileged scope, since that
/// directory isn't readable by the unprivileged runner process.
pub struct VerificationManager {
    validator: FileValidator,
    privilege: Arc<PrivilegeManager>,
}

impl VerificationManager {
    pub fn new(validator: FileValidator, privilege: Arc<PrivilegeManager>) -> Self {
        VerificationManager { validator, privilege }
    }

    pub fn verify_path(&self, path: &Path) -> Result<(), VerificationError> {
        let outcome = self
            .privilege
            .with_privileges("verify hash manifest entry", Some(Uid::from_raw(0)), None, || {
                self.validator.verify(path)
            })
            .map_err(|e| VerificationError::ElevationFailed(e.to_string()))?;

        outcome.map_err(|err| classify(err, path))
    }

    /// Aborts on the first mismatch (spec §4.10: "aborts on first
    /// mismatch with a classified error").
    pub fn verify_all<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> Result<(), VerificationError> {
        for path in paths {
            self.verify_path(Path::new(path))?;
        }
        Ok(())
    }
}

fn classify(err: ManifestError, path: &Path) -> VerificationError {
    let path = path.display().to_string();
    match err {
        ManifestError::Mismatch { .. } => VerificationError::FileModified { path },
        ManifestError::NoEntry(_) => VerificationError::HashFileMissing { path },
        ManifestError::Io(SafeIoError::NotFound(_)) => VerificationError::FileMissing { path },
        other => VerificationError::AccessFailed {
            path,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scr_fsguard::{GroupMembership, SafeFileIo};
    use std::time::Duration;
    use tempfile::tempdir;

    fn manager(hash_dir: &Path) -> VerificationManager {
        let io = Arc::new(SafeFileIo::new(Arc::new(GroupMembership::new(Duration::from_secs(30)))));
        let validator = FileValidator::new(hash_dir.to_path_buf(), io);
        VerificationManager::new(validator, Arc::new(PrivilegeManager::new()))
    }

    #[test]
    fn verifies_an_unmodified_file() {
        let workdir = tempdir().unwrap();
        let hash_dir = tempdir().unwrap();
        let target = workdir.path().join("binary");
        std::fs::write(&target, b"payload").unwrap();

        let mgr = manager(hash_dir.path());
        mgr.validator.record(&target).unwrap();
        assert!(mgr.verify_path(&target).is_ok());
    }

    #[test]
    fn reports_missing_manifest_entry() {
        let workdir = tempdir().unwrap();
        let hash_dir = tempdir().unwrap();
        let target = workdir.path().join("never-recorded");
        std::fs::write(&target, b"x").unwrap();

        let mgr = manager(hash_dir.path());
        let err = mgr.verify_path(&target).unwrap_err();
        assert!(matches!(err, VerificationError::HashFileMissing { .. }));
    }

    #[test]
    fn verify_all_stops_at_first_failure() {
        let workdir = tempdir().unwrap();
        let hash_dir = tempdir().unwrap();
        let good = workdir.path().join("good");
        let bad = workdir.path().join("bad");
        std::fs::write(&good, b"ok").unwrap();
        std::fs::write(&bad, b"not recorded").unwrap();

        let mgr = manager(hash_dir.path());
        mgr.validator.record(&good).unwrap();

        let paths = vec![good.to_str().unwrap(), bad.to_str().unwrap()];
        let err = mgr.verify_all(paths).unwrap_err();
        assert!(matches!(err, VerificationError::HashFileMissing { .. }));
    }
}
