//! Marking new category directories so backups skip them.

use std::fs;
use std::io;
use std::path::Path;

use crate::category::FileCategory;

/// File name of the cache directory tag.
pub const CACHEDIR_TAG: &str = "CACHEDIR.TAG";

const CACHEDIR_TAG_BODY: &str = "Signature: 8a477f597d28d172789f06886806bc55\n\
# This file is a cache directory tag created by filer.\n\
# For information about cache directory tags see https://bford.info/cachedir/\n";

/// Whether a directory created for `category` should be excluded.
pub fn should_exclude(category: FileCategory) -> bool {
    category.excluded_from_backup()
}

/// Applies the platform's "do not back up" attribute to a directory.
pub trait BackupExclusion: Send + Sync {
    fn exclude(&self, dir: &Path) -> io::Result<()>;
}

/// Writes a `CACHEDIR.TAG` into the directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheDirTag;

impl BackupExclusion for CacheDirTag {
    fn exclude(&self, dir: &Path) -> io::Result<()> {
        fs::write(dir.join(CACHEDIR_TAG), CACHEDIR_TAG_BODY)
    }
}
