//! Lazily created category directories.
//!
//! Existence is checked on every resolution rather than remembered, so a
//! category directory removed by a purge is simply created again the next
//! time it is needed. First creation is serialized per category so the
//! backup exclusion is applied once and a failure is logged once.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::backup::{should_exclude, BackupExclusion};
use crate::category::FileCategory;
use crate::error::StoreError;
use crate::layout::StorageLayout;

/// What a resolution had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirState {
    Existing,
    Created,
}

/// One mutex per category.
#[derive(Default)]
pub(crate) struct CategoryLocks {
    locks: [Mutex<()>; 6],
}

impl CategoryLocks {
    pub(crate) fn lock(&self, category: FileCategory) -> MutexGuard<'_, ()> {
        // A poisoned lock guards no data, only ordering.
        self.locks[category.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct CategoryDirectories {
    layout: StorageLayout,
    locks: CategoryLocks,
    exclusion: Arc<dyn BackupExclusion>,
}

impl CategoryDirectories {
    pub fn new(layout: StorageLayout, exclusion: Arc<dyn BackupExclusion>) -> Self {
        Self {
            layout,
            locks: CategoryLocks::default(),
            exclusion,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Path of the category directory without touching the disk.
    pub fn path_for(&self, category: FileCategory) -> PathBuf {
        self.layout.directory_for(category)
    }

    /// Ensures the category directory exists and returns it.
    pub fn ensure(&self, category: FileCategory) -> Result<(PathBuf, DirState), StoreError> {
        let dir = self.layout.directory_for(category);
        if dir.is_dir() {
            return Ok((dir, DirState::Existing));
        }

        let _guard = self.locks.lock(category);
        if dir.is_dir() {
            return Ok((dir, DirState::Existing));
        }
        fs::create_dir_all(&dir).map_err(|source| StoreError::DirectoryCreateFailed {
            path: dir.clone(),
            source,
        })?;
        debug!(%category, dir = %dir.display(), "created category directory");

        if should_exclude(category) {
            if let Err(err) = self.exclusion.exclude(&dir) {
                warn!(
                    %category,
                    dir = %dir.display(),
                    error = %err,
                    "failed to exclude directory from backups"
                );
            }
        }
        Ok((dir, DirState::Created))
    }

    /// Removes the whole category directory. Returns `None` when there was
    /// nothing to remove.
    pub fn remove(&self, category: FileCategory) -> Result<Option<PathBuf>, StoreError> {
        let dir = self.layout.directory_for(category);
        let _guard = self.locks.lock(category);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(Some(dir)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::delete(&dir, source)),
        }
    }
}
