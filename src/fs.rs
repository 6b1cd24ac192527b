//! File-system helpers shared by the schema store and the destructed log.
use std::io::{self, Write as _};
use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` in `path` against `home`.
#[must_use]
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    path.strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"))
        .map_or_else(|| PathBuf::from(path), |rest| home.join(rest))
}

/// Lexically normalise `path`: drop `.` components, fold `..` into its
/// parent and strip trailing separators.  The filesystem is not consulted,
/// so symlinks are not resolved.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in dunce::simplified(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = out.parent().is_none() && out.has_root();
                if !at_root && !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write `contents` to `path` atomically: stage to a sibling temp file, sync
/// it, then rename over the destination.
///
/// A crash at any point leaves either the previous file or the new one,
/// never a truncated mix.  The temp file is removed on failure.
///
/// # Errors
///
/// Returns an error if the temp file cannot be created, written, synced or
/// renamed into place.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        )
    })?;
    let tmp = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let staged = (|| -> io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()
    })();

    if let Err(e) = staged {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })
}

/// Recursively copy a directory tree.
///
/// Entries are classified with [`std::fs::DirEntry::file_type`], which does
/// not follow symlinks. A symlink is recreated as a link on Unix; elsewhere a
/// link to a file is copied as that file and a link to a directory is
/// skipped. A link pointing back up the tree is therefore never walked.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(std::fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        tracing::debug!("skipping directory link {}", src.display());
        Ok(())
    } else {
        std::fs::copy(src, dst).map(|_| ())
    }
}

/// Remove the file, symlink or directory tree at `path`. A symlink is
/// removed itself, never its target.
///
/// # Errors
///
/// Returns an error if `path` does not exist or cannot be removed.
pub fn remove_path(path: &Path) -> io::Result<()> {
    if std::fs::symlink_metadata(path)?.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Replace whatever is at `dst` with a copy of `src`.
///
/// The copy is staged in a sibling path and renamed into place, so `dst`
/// ends up holding exactly what `src` holds: entries that exist under an old
/// `dst` directory but not in `src` do not survive. A failed copy leaves
/// `dst` untouched.
///
/// # Errors
///
/// Returns an error if the copy cannot be staged, the old `dst` cannot be
/// removed, or the staged copy cannot be renamed into place.
pub fn replace_with_copy(src: &Path, dst: &Path) -> io::Result<()> {
    ensure_parent_dir(dst)?;
    let file_name = dst.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file path: {}", dst.display()),
        )
    })?;
    let staging = dst.with_file_name(format!(
        ".{}.{}.restore",
        file_name.to_string_lossy(),
        std::process::id()
    ));
    if std::fs::symlink_metadata(&staging).is_ok() {
        remove_path(&staging)?;
    }

    let staged = if src.is_dir() {
        copy_dir_recursive(src, &staging)
    } else {
        std::fs::copy(src, &staging).map(|_| ())
    };
    if let Err(e) = staged {
        let _ = remove_path(&staging);
        return Err(e);
    }

    // rename() only replaces a file with a file; anything else goes first.
    let dst_meta = std::fs::symlink_metadata(dst).ok();
    let dst_is_dir = dst_meta.as_ref().is_some_and(std::fs::Metadata::is_dir);
    if dst_meta.is_some()
        && (src.is_dir() || dst_is_dir)
        && let Err(e) = remove_path(dst)
    {
        let _ = remove_path(&staging);
        return Err(e);
    }

    std::fs::rename(&staging, dst).inspect_err(|_| {
        let _ = remove_path(&staging);
    })
}
