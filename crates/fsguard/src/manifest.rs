// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scr_core::manifest_key::{encode_manifest_key, ManifestKeyError};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::safe_io::{SafeFileIo, SafeIoError, DEFAULT_FILE_MODE};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest key encoding failed: {0}")]
    KeyEncoding(#[from] ManifestKeyError),

    #[error(transparent)]
    Io(#[from] SafeIoError),

    #[error("no manifest entry recorded for '{0}'")]
    NoEntry(String),

    #[error("hash mismatch for '{path}': recorded {recorded}, computed {computed}")]
    Mismatch {
        path: String,
        recorded: String,
        computed: String,
    },
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Computes and compares SHA-256 hash-manifest entries (spec §4.3). Every
/// manifest entry lives at `<hash_dir>/<encoded-path>` and contains the
/// hex digest of the referenced file's bytes; manifest files themselves
/// are root-owned and opened through [`SafeFileIo`].
pub struct FileValidator {
    hash_dir: PathBuf,
    io: Arc<SafeFileIo>,
}

impl FileValidator {
    pub fn new(hash_dir: PathBuf, io: Arc<SafeFileIo>) -> Self {
        FileValidator { hash_dir, io }
    }

    fn manifest_entry_path(&self, path: &str) -> Result<PathBuf, ManifestError> {
        Ok(self.hash_dir.join(encode_manifest_key(path)?))
    }

    /// Compute the digest of `path` and write it to the manifest. Used
    /// only by the offline recording tool, never at runtime.
    pub fn record(&self, path: &Path) -> Result<(), ManifestError> {
        let contents = self.io.safe_read_file(path)?;
        let digest = hex_sha256(&contents);
        let entry_path = self.manifest_entry_path(&path.display().to_string())?;
        self.io
            .safe_write_file(&entry_path, digest.as_bytes(), Some(DEFAULT_FILE_MODE))?;
        Ok(())
    }

    /// Recompute `path`'s digest and compare it to the stored manifest
    /// entry.
    pub fn verify(&self, path: &Path) -> Result<(), ManifestError> {
        let entry_path = self.manifest_entry_path(&path.display().to_string())?;
        let recorded = self
            .io
            .safe_read_file(&entry_path)
            .map_err(|e| match e {
                SafeIoError::NotFound(_) => ManifestError::NoEntry(path.display().to_string()),
                other => ManifestError::Io(other),
            })?;
        let recorded = String::from_utf8_lossy(&recorded).trim().to_string();

        let contents = self.io.safe_read_file(path)?;
        let computed = hex_sha256(&contents);

        if recorded != computed {
            return Err(ManifestError::Mismatch {
                path: path.display().to_string(),
                recorded,
                computed,
            });
        }
        Ok(())
    }
}
