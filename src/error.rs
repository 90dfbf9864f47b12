use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure reported by the file store.
///
/// `InvalidArgument` is returned synchronously, before any work is
/// dispatched. Every other variant is a runtime failure and only ever
/// reaches the caller through an operation's completion.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to delete {}: {source}", .path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no free file name in {} after {attempts} attempts", .dir.display())]
    AllocationExhausted { dir: PathBuf, attempts: u32 },
}

impl StoreError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        StoreError::InvalidArgument(message.into())
    }

    pub(crate) fn write(path: &Path, source: io::Error) -> Self {
        StoreError::WriteFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn read(path: &Path, source: io::Error) -> Self {
        StoreError::ReadFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn delete(path: &Path, source: io::Error) -> Self {
        StoreError::DeleteFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when a write was refused because the target already existed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::WriteFailed { source, .. } if source.kind() == io::ErrorKind::AlreadyExists
        )
    }

    /// Path the failure is about, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            StoreError::InvalidArgument(_) => None,
            StoreError::NotFound(path) => Some(path),
            StoreError::DirectoryCreateFailed { path, .. }
            | StoreError::WriteFailed { path, .. }
            | StoreError::ReadFailed { path, .. }
            | StoreError::DeleteFailed { path, .. } => Some(path),
            StoreError::AllocationExhausted { dir, .. } => Some(dir),
        }
    }
}
