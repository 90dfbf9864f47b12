//! Blocking file-system steps. These run on the worker pool only.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::backup::CACHEDIR_TAG;
use crate::error::StoreError;

const TEMP_PREFIX: &str = ".filer-";

/// Writes `data` to `target` all-or-nothing. The bytes go to a hidden
/// temporary file in `dir` first and are then linked into place without
/// replacing anything; an existing `target` makes this a conflict.
pub(crate) fn write_exclusive(dir: &Path, target: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut staged = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|err| StoreError::write(target, err))?;
    staged
        .write_all(data)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|err| StoreError::write(target, err))?;
    staged
        .persist_noclobber(target)
        .map_err(|err| StoreError::write(target, err.error))?;
    Ok(())
}

/// Removes a regular file that is about to be overwritten. A file that is
/// already gone is fine.
pub(crate) fn clear_for_overwrite(target: &Path) -> Result<(), StoreError> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => Err(StoreError::write(
            target,
            io::Error::new(io::ErrorKind::Other, "a directory is in the way"),
        )),
        Ok(_) => match fs::remove_file(target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::delete(target, err)),
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::delete(target, err)),
    }
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
        _ => StoreError::read(path, err),
    })
}

/// Removes a file, or a directory with everything in it.
pub(crate) fn remove_entry(path: &Path) -> Result<(), StoreError> {
    let meta = fs::symlink_metadata(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
        _ => StoreError::delete(path, err),
    })?;
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
        _ => StoreError::delete(path, err),
    })
}

/// Regular files directly inside `dir`, sorted, skipping hidden files and
/// the backup marker. A missing directory has no files.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            let source = err
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory loop"));
            StoreError::read(dir, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name == CACHEDIR_TAG {
            continue;
        }
        files.push(entry.into_path());
    }
    files.sort();
    Ok(files)
}
