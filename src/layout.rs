//! On-disk layout of the category directories.
//!
//! Every category resolves to `<root>/<product>/<subdirectory>`, where the
//! root is one of the three platform areas. Keeping the joins here means the
//! rest of the crate never builds category paths by hand.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::category::{FileCategory, RootArea};

/// Name of the cache-area root used under a `FILER_HOME` style directory.
pub const CACHES_SUBDIR: &str = "Caches";
/// Name of the document-area root used under a `FILER_HOME` style directory.
pub const DOCUMENTS_SUBDIR: &str = "Documents";
/// Name of the temp-area root used under a `FILER_HOME` style directory.
pub const TEMP_SUBDIR: &str = "tmp";

/// The three platform areas categories are rooted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoots {
    pub cache: PathBuf,
    pub documents: PathBuf,
    pub temp: PathBuf,
}

impl StorageRoots {
    /// Places all three areas under one directory.
    pub fn under(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        Self {
            cache: home.join(CACHES_SUBDIR),
            documents: home.join(DOCUMENTS_SUBDIR),
            temp: home.join(TEMP_SUBDIR),
        }
    }

    pub fn area(&self, area: RootArea) -> &Path {
        match area {
            RootArea::Cache => &self.cache,
            RootArea::Documents => &self.documents,
            RootArea::Temp => &self.temp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    roots: StorageRoots,
    product: String,
}

impl StorageLayout {
    /// Temp purges delete `<temp>/<product>` wholesale, so the temp area
    /// must not coincide with either of the other two.
    pub fn new(roots: StorageRoots, product: impl Into<String>) -> Result<Self> {
        let product = product.into();
        if product.trim().is_empty() || product.contains(['/', '\\']) {
            bail!("Product directory name {:?} is not a single path component", product);
        }
        if roots.temp == roots.cache || roots.temp == roots.documents {
            bail!(
                "Temp root {:?} must differ from the cache and documents roots",
                roots.temp
            );
        }
        Ok(Self { roots, product })
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Directory for the category. Pure: nothing is created.
    pub fn directory_for(&self, category: FileCategory) -> PathBuf {
        let product_dir = self.roots.area(category.root_area()).join(&self.product);
        match category.subdirectory() {
            Some(subdir) => product_dir.join(subdir),
            None => product_dir,
        }
    }
}
