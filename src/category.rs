//! File categories and the fixed facts derived from them.
//!
//! A category decides which platform area a file lives in, the subdirectory
//! below the product directory, whether that directory is kept out of
//! backups, and the extension used for generated names. All of it is a pure
//! lookup; creating directories happens elsewhere.

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Platform storage area a category is rooted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootArea {
    Cache,
    Documents,
    Temp,
}

/// Closed set of storage buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Thumbnail,
    FullImage,
    Audio,
    Video,
    Database,
    Temp,
}

struct CategoryEntry {
    root: RootArea,
    subdirectory: Option<&'static str>,
    exclude_from_backup: bool,
    extension: &'static str,
    label: &'static str,
}

const fn entry(category: FileCategory) -> CategoryEntry {
    match category {
        FileCategory::Thumbnail => CategoryEntry {
            root: RootArea::Cache,
            subdirectory: Some("Thumbs"),
            exclude_from_backup: true,
            extension: "jpg",
            label: "thumbnail",
        },
        FileCategory::FullImage => CategoryEntry {
            root: RootArea::Cache,
            subdirectory: Some("Images"),
            exclude_from_backup: true,
            extension: "jpg",
            label: "image",
        },
        FileCategory::Audio => CategoryEntry {
            root: RootArea::Cache,
            subdirectory: Some("Audio"),
            exclude_from_backup: true,
            extension: "m4a",
            label: "audio",
        },
        FileCategory::Video => CategoryEntry {
            root: RootArea::Cache,
            subdirectory: Some("Video"),
            exclude_from_backup: true,
            extension: "mp4",
            label: "video",
        },
        FileCategory::Database => CategoryEntry {
            root: RootArea::Documents,
            subdirectory: Some("Database"),
            exclude_from_backup: false,
            extension: "sqlite",
            label: "database",
        },
        FileCategory::Temp => CategoryEntry {
            root: RootArea::Temp,
            subdirectory: None,
            exclude_from_backup: true,
            extension: "tmp",
            label: "temp",
        },
    }
}

impl FileCategory {
    pub const ALL: [FileCategory; 6] = [
        FileCategory::Thumbnail,
        FileCategory::FullImage,
        FileCategory::Audio,
        FileCategory::Video,
        FileCategory::Database,
        FileCategory::Temp,
    ];

    pub fn root_area(self) -> RootArea {
        entry(self).root
    }

    /// Directory below the product directory; `None` means the product
    /// directory itself.
    pub fn subdirectory(self) -> Option<&'static str> {
        entry(self).subdirectory
    }

    /// Whether a freshly created directory for this category is marked to
    /// skip backups.
    pub fn excluded_from_backup(self) -> bool {
        entry(self).exclude_from_backup
    }

    /// Extension used for opaque generated names.
    pub fn default_extension(self) -> &'static str {
        entry(self).extension
    }

    pub fn label(self) -> &'static str {
        entry(self).label
    }

    pub(crate) fn index(self) -> usize {
        match self {
            FileCategory::Thumbnail => 0,
            FileCategory::FullImage => 1,
            FileCategory::Audio => 2,
            FileCategory::Video => 3,
            FileCategory::Database => 4,
            FileCategory::Temp => 5,
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FileCategory {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thumbnail" | "thumbnails" | "thumbs" => Ok(FileCategory::Thumbnail),
            "image" | "images" | "full-image" => Ok(FileCategory::FullImage),
            "audio" => Ok(FileCategory::Audio),
            "video" => Ok(FileCategory::Video),
            "database" | "db" => Ok(FileCategory::Database),
            "temp" | "tmp" => Ok(FileCategory::Temp),
            other => Err(StoreError::invalid(format!("unknown file category {other:?}"))),
        }
    }
}

/// Anything the store can file away: it only needs to know its category and
/// the extension generated names should carry.
pub trait Filer {
    fn category(&self) -> FileCategory;

    fn extension(&self) -> String;
}

impl Filer for FileCategory {
    fn category(&self) -> FileCategory {
        *self
    }

    fn extension(&self) -> String {
        self.default_extension().to_string()
    }
}
