//! Unique file names inside a category directory.
//!
//! Opaque names are random UUIDs and collide only in theory; named
//! allocation keeps the caller's name and disambiguates by appending an
//! increasing counter to the stem (`pic.png`, `pic1.png`, `pic2.png`, ...).
//! Both loops are capped.
//!
//! A picked name is reserved in memory until it is released, so concurrent
//! allocations in one store never hand out the same path even before
//! anything is written there. Other processes are not covered: the write
//! itself refuses to clobber, and a refused write re-allocates.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::backup::CACHEDIR_TAG;
use crate::category::FileCategory;
use crate::error::StoreError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// Strips a raw name down to something safe on every file system:
/// whitespace goes everywhere, and stem and extension keep only
/// alphanumerics. The last `.` separates the two.
pub fn sanitize_file_name(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.rsplit_once('.') {
        Some((stem, extension)) => format!("{}.{}", clean(stem), clean(extension)),
        None => compact,
    }
}

fn clean(part: &str) -> String {
    part.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// A validated `<stem>.<extension>` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    stem: String,
    extension: String,
}

impl FileName {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        if raw.chars().count() <= 2 {
            return Err(StoreError::invalid(format!("file name {raw:?} is too short")));
        }
        if !raw.contains('.') {
            return Err(StoreError::invalid(format!(
                "file name {raw:?} has no extension"
            )));
        }
        let cleaned = sanitize_file_name(raw);
        if cleaned.eq_ignore_ascii_case(CACHEDIR_TAG) {
            return Err(StoreError::invalid(format!(
                "file name {raw:?} is reserved for the backup marker"
            )));
        }
        match cleaned.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => Ok(Self {
                stem: stem.to_string(),
                extension: extension.to_string(),
            }),
            _ => Err(StoreError::invalid(format!(
                "file name {raw:?} has nothing usable left after cleaning"
            ))),
        }
    }

    /// Name of a file that already lives somewhere on disk.
    pub fn of_path(path: &Path) -> Result<Self, StoreError> {
        let raw = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StoreError::invalid(format!("{} has no file name", path.display())))?;
        Self::parse(raw)
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The name with `n` appended to the stem; `0` is the name itself.
    pub fn candidate(&self, n: u32) -> String {
        if n == 0 {
            format!("{}.{}", self.stem, self.extension)
        } else {
            format!("{}{}.{}", self.stem, n, self.extension)
        }
    }
}

/// Checks an extension supplied through [`crate::Filer`].
pub(crate) fn clean_extension(raw: &str) -> Result<String, StoreError> {
    let cleaned = clean(raw.trim_start_matches('.'));
    if cleaned.is_empty() {
        return Err(StoreError::invalid(format!("extension {raw:?} is empty")));
    }
    Ok(cleaned)
}

pub struct NameAllocator {
    max_attempts: u32,
    reserved: [Mutex<HashSet<PathBuf>>; 6],
}

impl NameAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            reserved: Default::default(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `<uuid>.<extension>` neither present in `dir` nor reserved.
    pub fn opaque(
        &self,
        category: FileCategory,
        dir: &Path,
        extension: &str,
    ) -> Result<Reservation<'_>, StoreError> {
        self.reserve(category, dir, |_| {
            dir.join(format!("{}.{extension}", Uuid::new_v4()))
        })
    }

    /// `name` itself if free, otherwise the first free disambiguated form.
    pub fn named(
        &self,
        category: FileCategory,
        dir: &Path,
        name: &FileName,
    ) -> Result<Reservation<'_>, StoreError> {
        self.reserve(category, dir, |n| dir.join(name.candidate(n)))
    }

    /// Drops every reservation in `category`, for when its directory is
    /// removed wholesale.
    pub fn forget(&self, category: FileCategory) {
        self.reserved(category).clear();
    }

    fn reserve(
        &self,
        category: FileCategory,
        dir: &Path,
        candidate: impl Fn(u32) -> PathBuf,
    ) -> Result<Reservation<'_>, StoreError> {
        let mut reserved = self.reserved(category);
        for n in 0..self.max_attempts {
            let path = candidate(n);
            if exists(&path) {
                // The file is there now; the disk is the authority again.
                reserved.remove(&path);
                continue;
            }
            if reserved.insert(path.clone()) {
                return Ok(Reservation {
                    allocator: self,
                    category,
                    path,
                    held: true,
                });
            }
        }
        Err(StoreError::AllocationExhausted {
            dir: dir.to_path_buf(),
            attempts: self.max_attempts,
        })
    }

    fn reserved(&self, category: FileCategory) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.reserved[category.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A path no other allocation will hand out while this is alive.
pub struct Reservation<'a> {
    allocator: &'a NameAllocator,
    category: FileCategory,
    path: PathBuf,
    held: bool,
}

impl Reservation<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gives the path to a caller who will create the file later. The name
    /// stays reserved until a file shows up there or the category is
    /// forgotten.
    pub fn hand_off(mut self) -> PathBuf {
        self.held = false;
        std::mem::take(&mut self.path)
    }
}

impl fmt::Debug for Reservation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("category", &self.category)
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.held {
            self.allocator.reserved(self.category).remove(&self.path);
        }
    }
}

// Dangling symlinks count as taken.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
