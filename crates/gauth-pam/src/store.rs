//! Locked load and atomic replace of the secret file
//!
//! Load takes an exclusive advisory lock on the descriptor and keeps it
//! alive in the returned guard for the whole read-modify-write. Because a
//! concurrent writer replaces the inode, the lock alone is not enough: the
//! guard captures `{dev, ino, size, mtime_ns}` at load time and store
//! re-stats the path by name, aborting with [`PamError::SecretModified`]
//! when anything changed.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use gauth::{secretfile, Config, MAX_FILE_SIZE};
use tracing::debug;

use crate::account::Account;
use crate::error::{PamError, Result};
use crate::params::Params;

/// File identity captured at load time for the optimistic-concurrency guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileState {
    pub dev: u64,
    pub ino: u64,
    pub size: u64,
    pub mtime_ns: i64,
}

impl FileState {
    fn of(meta: &fs::Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            size: meta.size(),
            mtime_ns: meta.mtime() * 1_000_000_000 + meta.mtime_nsec(),
        }
    }
}

/// Holds the exclusive lock on the loaded descriptor through the
/// read-modify-write; dropping it releases the lock.
#[derive(Debug)]
pub struct SecretGuard {
    // Keeps the flock alive; never read after load.
    _file: File,
    path: PathBuf,
    state: FileState,
}

/// Open, lock, validate, and parse the secret file for an account.
pub fn load(path: &Path, account: &Account, params: &Params) -> Result<(Config, SecretGuard)> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW | libc::O_CLOEXEC)
        .open(path)
        .map_err(|e| PamError::io(path, e))?;
    flock_exclusive(&file).map_err(|e| PamError::io(path, e))?;

    let meta = file.metadata().map_err(|e| PamError::io(path, e))?;
    validate_metadata(path, &meta, account, params)?;
    if meta.size() > MAX_FILE_SIZE as u64 {
        return Err(gauth::Error::FileTooLarge.into());
    }

    let mut data = Vec::with_capacity(meta.size() as usize);
    (&file)
        .read_to_end(&mut data)
        .map_err(|e| PamError::io(path, e))?;
    let config = secretfile::parse(&data)?;
    let state = FileState::of(&meta);
    debug!(path = %path.display(), ino = state.ino, "loaded secret file");

    Ok((
        config,
        SecretGuard {
            _file: file,
            path: path.to_path_buf(),
            state,
        },
    ))
}

fn validate_metadata(
    path: &Path,
    meta: &fs::Metadata,
    account: &Account,
    params: &Params,
) -> Result<()> {
    if !meta.file_type().is_file() {
        return Err(PamError::NotRegularFile(path.to_path_buf()));
    }
    let mode = meta.mode() & 0o777;
    if mode > params.allowed_perm {
        return Err(PamError::PermissionsTooOpen {
            mode,
            allowed: params.allowed_perm,
        });
    }
    if !params.no_strict_owner && meta.uid() != account.uid {
        return Err(PamError::WrongOwner {
            actual: meta.uid(),
            expected: account.uid,
        });
    }
    Ok(())
}

fn flock_exclusive(file: &File) -> std::io::Result<()> {
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

impl SecretGuard {
    pub fn state(&self) -> FileState {
        self.state
    }

    /// Serialize and atomically replace the secret file, subject to the
    /// optimistic-concurrency guard.
    pub fn store(&self, config: &Config, perm: u32) -> Result<()> {
        let meta = fs::symlink_metadata(&self.path).map_err(|e| PamError::io(&self.path, e))?;
        if FileState::of(&meta) != self.state {
            return Err(PamError::SecretModified);
        }
        write_replace(&self.path, config, perm)
    }
}

/// Write a config to `path` by temp-file-and-rename, without a prior load.
/// Used by enrollment, which owns the file it is creating.
pub fn save(path: &Path, config: &Config, perm: u32) -> Result<()> {
    write_replace(path, config, perm)
}

fn write_replace(path: &Path, config: &Config, perm: u32) -> Result<()> {
    let data = secretfile::serialize(config)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".gauth-")
        .tempfile_in(dir)
        .map_err(|e| PamError::io(dir, e))?;
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(perm))
        .map_err(|e| PamError::io(tmp.path().to_path_buf(), e))?;
    tmp.write_all(&data)
        .map_err(|e| PamError::io(tmp.path().to_path_buf(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PamError::io(tmp.path().to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| PamError::io(path, e.error))?;

    // The rename is only durable once the directory entry is.
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    debug!(path = %path.display(), bytes = data.len(), "replaced secret file");
    Ok(())
}
