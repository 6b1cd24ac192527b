//! Filesystem operation abstractions for dependency injection.
//!
//! The schema store and the destructed-files log reach the filesystem only
//! through [`FileSystemOps`], so their failure handling (a write that fails, a
//! backup that cannot be deleted) can be unit-tested with a mock.  Production
//! code uses [`SystemFileSystemOps`].
//!
//! Every fallible method returns an [`std::io::Result`]; nothing here panics.

use std::io;
use std::path::Path;

use crate::fs;

/// Abstraction over the filesystem calls used by the core.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystemOps: Send + Sync {
    /// Returns `true` if something (including a broken symlink) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` itself is a symlink.
    fn is_symlink(&self, path: &Path) -> bool;

    /// Read the whole file at `path` as bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error, `NotFound` included.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Read the whole file at `path` as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error, `NotFound` included.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace the file at `path` with `contents` via temp file plus rename,
    /// creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Copy a file or directory tree from `src` to `dst`, creating parents.
    ///
    /// # Errors
    ///
    /// Returns an error if `src` cannot be read or `dst` cannot be written.
    fn copy_recursive(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Replace whatever is at `dst` with a copy of `src`, so that `dst`
    /// holds nothing `src` does not.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be staged or swapped in; `dst` is
    /// then left as it was when staging failed.
    fn replace_recursive(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Remove the file, symlink or directory tree at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or cannot be removed.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Remove the directory at `path` if it is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not an empty directory.
    fn remove_empty_dir(&self, path: &Path) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists() || path.symlink_metadata().is_ok()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::atomic_write(path, contents)
    }

    fn copy_recursive(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::ensure_parent_dir(dst)?;
        if src.is_dir() {
            fs::copy_dir_recursive(src, dst)
        } else {
            std::fs::copy(src, dst).map(|_| ())
        }
    }

    fn replace_recursive(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::replace_with_copy(src, dst)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_path(path)
    }

    fn remove_empty_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }
}
