// SPDX-License-Identifier: MIT

use std::ffi::CString;
use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::FromRawFd;
use std::path::{Component, Path};
use std::sync::Arc;

use nix::fcntl::OFlag;
use nix::sys::stat::{fstat, Mode, SFlag};
use thiserror::Error;

use crate::membership::{FileOwnership, GroupMembership};

pub const DEFAULT_FILE_MODE: u32 = 0o600;

#[derive(Debug, Error)]
pub enum SafeIoError {
    #[error("path '{0}' is not absolute or contains a '..' component")]
    InvalidPath(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("'{0}' exists but is not a regular file")]
    NotRegularFile(String),

    #[error("refused to follow symlink at '{0}'")]
    SymlinkRejected(String),

    #[error("'{0}' is group- or world-writable and not safely owned by the current user")]
    GroupWritableUnsafe(String),

    #[error("I/O error on '{0}': {1}")]
    Io(String, String),
}

fn validate_path(path: &Path) -> Result<(), SafeIoError> {
    if !path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(SafeIoError::InvalidPath(path.display().to_string()));
    }
    Ok(())
}

#[cfg(all(target_os = "linux"))]
mod openat2 {
    use std::ffi::CString;
    use std::os::unix::io::RawFd;

    #[repr(C)]
    struct OpenHow {
        flags: u64,
        mode: u64,
        resolve: u64,
    }

    const RESOLVE_NO_SYMLINKS: u64 = 0x04;

    /// Best-effort `openat2(2)` with `RESOLVE_NO_SYMLINKS`. Returns `None`
    /// if the kernel doesn't support the syscall (pre-5.6, or seccomp
    /// filtered), in which case the caller falls back to `O_NOFOLLOW`.
    pub fn open_no_symlinks(path: &CString, flags: i32) -> Option<std::io::Result<RawFd>> {
        let how = OpenHow {
            flags: flags as u64,
            mode: 0,
            resolve: RESOLVE_NO_SYMLINKS,
        };
        let ret = unsafe {
            libc::syscall(
                libc::SYS_openat2,
                libc::AT_FDCWD,
                path.as_ptr(),
                &how as *const OpenHow,
                std::mem::size_of::<OpenHow>(),
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOSYS) {
                return None;
            }
            return Some(Err(err));
        }
        Some(Ok(ret as RawFd))
    }
}

/// Symlink-safe open/read/write primitives (spec §4.2). Every operation
/// validates that the path is absolute and free of `..` components, and
/// refuses to follow a symlink at the final path component.
pub struct SafeFileIo {
    membership: Arc<GroupMembership>,
}

impl SafeFileIo {
    pub fn new(membership: Arc<GroupMembership>) -> Self {
        SafeFileIo { membership }
    }

    fn raw_open_no_follow(path: &Path, flags: OFlag, mode: Mode) -> Result<File, SafeIoError> {
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| SafeIoError::InvalidPath(path.display().to_string()))?;

        #[cfg(target_os = "linux")]
        {
            if let Some(result) = openat2::open_no_symlinks(&cpath, flags.bits()) {
                return result
                    .map(|fd| unsafe { File::from_raw_fd(fd) })
                    .map_err(|e| map_open_err(path, e.raw_os_error()));
            }
        }

        let flags = flags | OFlag::O_NOFOLLOW;
        nix::fcntl::open(path, flags, mode)
            .map(|fd| unsafe { File::from_raw_fd(fd) })
            .map_err(|e| map_open_err(path, Some(e as i32)))
    }

    /// `safe_open_read` (spec §4.2): resolve without following symlinks,
    /// verify the result is a regular file, and refuse files that are
    /// group- or world-writable unless the current user is the sole
    /// writer.
    pub fn safe_open_read(&self, path: &Path) -> Result<File, SafeIoError> {
        validate_path(path)?;
        let file = Self::raw_open_no_follow(path, OFlag::O_RDONLY, Mode::empty())?;

        use std::os::unix::io::AsRawFd;
        let st = fstat(file.as_raw_fd())
            .map_err(|e| SafeIoError::Io(path.display().to_string(), e.to_string()))?;

        if (st.st_mode & SFlag::S_IFMT.bits() as u32) != SFlag::S_IFREG.bits() as u32 {
            return Err(SafeIoError::NotRegularFile(path.display().to_string()));
        }

        let ownership = FileOwnership {
            uid: st.st_uid,
            gid: st.st_gid,
            mode: st.st_mode,
        };
        if !self.membership.can_current_user_safely_read(&ownership) {
            return Err(SafeIoError::GroupWritableUnsafe(path.display().to_string()));
        }

        Ok(file)
    }

    pub fn safe_read_file(&self, path: &Path) -> Result<Vec<u8>, SafeIoError> {
        let mut file = self.safe_open_read(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| SafeIoError::Io(path.display().to_string(), e.to_string()))?;
        Ok(buf)
    }

    /// `safe_write_file` (spec §4.2): create exclusively (refusing to
    /// clobber an existing path, including an existing symlink), write,
    /// fsync, close.
    pub fn safe_write_file(&self, path: &Path, bytes: &[u8], mode: Option<u32>) -> Result<(), SafeIoError> {
        validate_path(path)?;
        let mode_bits = Mode::from_bits_truncate(mode.unwrap_or(DEFAULT_FILE_MODE));
        let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_NOFOLLOW;
        let mut file = nix::fcntl::open(path, flags, mode_bits)
            .map(|fd| unsafe { File::from_raw_fd(fd) })
            .map_err(|e| map_open_err(path, Some(e as i32)))?;

        file.write_all(bytes)
            .map_err(|e| SafeIoError::Io(path.display().to_string(), e.to_string()))?;
        file.sync_all()
            .map_err(|e| SafeIoError::Io(path.display().to_string(), e.to_string()))?;
        Ok(())
    }
}

fn map_open_err(path: &Path, errno: Option<i32>) -> SafeIoError {
    match errno {
        Some(libc::ENOENT) => SafeIoError::NotFound(path.display().to_string()),
        Some(libc::EACCES) | Some(libc::EPERM) => SafeIoError::PermissionDenied(path.display().to_string()),
        Some(libc::ELOOP) => SafeIoError::SymlinkRejected(path.display().to_string()),
        Some(errno) => SafeIoError::Io(path.display().to_string(), std::io::Error::from_raw_os_error(errno).to_string()),
        None => SafeIoError::Io(path.display().to_string(), "unknown I/O error".to_string()),
    }
}
