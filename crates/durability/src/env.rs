//! Storage environment abstraction
//!
//! The checkpoint pipeline never touches `std::fs` directly; it goes
//! through [`StorageEnv`] so tests can observe, deny, or fail individual
//! filesystem operations. [`StdEnv`] is the production implementation.
//!
//! Hard links are the one operation with a capability boundary: linking
//! across devices (or on filesystems without link support) reports
//! [`EnvError::Unsupported`], which callers recover from by copying
//! instead. Every other failure is a plain I/O error.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from storage environment operations
#[derive(Debug, Error)]
pub enum EnvError {
    /// Operation not supported by the underlying filesystem
    /// (cross-device link, or no link support at all)
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type alias for environment operations
pub type EnvResult<T> = std::result::Result<T, EnvError>;

/// Filesystem operations the checkpoint pipeline depends on
pub trait StorageEnv {
    /// Check whether a filesystem entry exists at `path`
    fn exists(&self, path: &Path) -> EnvResult<bool>;

    /// Create a single directory; fails if it already exists
    fn create_dir(&self, path: &Path) -> EnvResult<()>;

    /// Hard-link `src` to `dst`
    ///
    /// Reports [`EnvError::Unsupported`] when the filesystem cannot link
    /// (cross-device, or no link support).
    fn link(&self, src: &Path, dst: &Path) -> EnvResult<()>;

    /// Copy `src` to `dst`, at most `limit` bytes when given
    ///
    /// With `limit = None` the whole file is copied. The destination is
    /// created fresh and fsynced before returning.
    fn copy_range(&self, src: &Path, dst: &Path, limit: Option<u64>) -> EnvResult<()>;

    /// Atomically rename `src` to `dst`
    fn rename(&self, src: &Path, dst: &Path) -> EnvResult<()>;

    /// Delete a single file
    fn delete_file(&self, path: &Path) -> EnvResult<()>;

    /// Delete an (empty) directory
    fn delete_dir(&self, path: &Path) -> EnvResult<()>;

    /// List the entries of a directory as full paths
    fn list_entries(&self, path: &Path) -> EnvResult<Vec<PathBuf>>;

    /// Durability barrier on a directory entry (open + fsync)
    fn sync_dir(&self, path: &Path) -> EnvResult<()>;
}

/// `EXDEV`: link target on a different device
#[cfg(unix)]
const CROSS_DEVICE_CODE: i32 = 18;
/// `ERROR_NOT_SAME_DEVICE`
#[cfg(windows)]
const CROSS_DEVICE_CODE: i32 = 17;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Production environment over `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdEnv;

impl StdEnv {
    /// Create a new standard environment
    pub fn new() -> Self {
        StdEnv
    }
}

impl StorageEnv for StdEnv {
    fn exists(&self, path: &Path) -> EnvResult<bool> {
        match fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dir(&self, path: &Path) -> EnvResult<()> {
        fs::create_dir(path)?;
        Ok(())
    }

    fn link(&self, src: &Path, dst: &Path) -> EnvResult<()> {
        match fs::hard_link(src, dst) {
            Ok(()) => Ok(()),
            Err(e)
                if e.raw_os_error() == Some(CROSS_DEVICE_CODE)
                    || e.kind() == io::ErrorKind::Unsupported =>
            {
                Err(EnvError::Unsupported(format!(
                    "hard link {} -> {}: {}",
                    src.display(),
                    dst.display(),
                    e
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn copy_range(&self, src: &Path, dst: &Path, limit: Option<u64>) -> EnvResult<()> {
        let source = File::open(src)?;
        let mut dest = OpenOptions::new().create_new(true).write(true).open(dst)?;

        let mut remaining = source.take(limit.unwrap_or(u64::MAX));
        let mut buffer = [0u8; COPY_BUF_SIZE];
        loop {
            let bytes_read = remaining.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            dest.write_all(&buffer[..bytes_read])?;
        }

        dest.sync_all()?;
        Ok(())
    }

    fn rename(&self, src: &Path, dst: &Path) -> EnvResult<()> {
        fs::rename(src, dst)?;
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> EnvResult<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn delete_dir(&self, path: &Path) -> EnvResult<()> {
        fs::remove_dir(path)?;
        Ok(())
    }

    fn list_entries(&self, path: &Path) -> EnvResult<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        Ok(entries)
    }

    fn sync_dir(&self, path: &Path) -> EnvResult<()> {
        let dir = File::open(path)?;
        dir.sync_all()?;
        Ok(())
    }
}
