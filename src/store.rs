//! The categorized asynchronous file store.
//!
//! Every public operation validates its arguments on the calling thread,
//! hands the file-system work to a background pool, and delivers exactly one
//! outcome to the completion on the store's [`ResultContext`]. A
//! background-work token is held from dispatch until that completion has
//! returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info_span};

use crate::backup::{BackupExclusion, CacheDirTag};
use crate::category::{FileCategory, Filer};
use crate::config::StoreConfig;
use crate::context::{Job, ResultContext};
use crate::directory::{CategoryDirectories, DirState};
use crate::error::StoreError;
use crate::guard::{BackgroundWork, GuardSpan, NoBackgroundWork};
use crate::layout::{StorageLayout, StorageRoots};
use crate::names::{clean_extension, FileName, NameAllocator, Reservation};
use crate::operation::{enter, OperationKind, Stage};
use crate::ops;

/// Name of the thread a default store runs completions on.
pub const RESULTS_THREAD_NAME: &str = "filer-results";

/// What a completion receives.
pub type Outcome<T = PathBuf> = Result<T, StoreError>;

/// Bytes to store plus where and how to store them.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    data: Vec<u8>,
    category: FileCategory,
    extension: String,
    name: Option<String>,
    overwrite: bool,
}

impl SaveRequest {
    /// Without a name the file gets an opaque unique name carrying the
    /// kind's extension.
    pub fn new<K: Filer + ?Sized>(data: impl Into<Vec<u8>>, kind: &K) -> Self {
        Self {
            data: data.into(),
            category: kind.category(),
            extension: kind.extension(),
            name: None,
            overwrite: false,
        }
    }

    /// Stores under exactly this (cleaned) name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With a name: whether an existing file of that name is replaced.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

enum Target {
    Opaque { extension: String },
    Named { name: FileName, overwrite: bool },
}

struct ValidSave {
    data: Vec<u8>,
    category: FileCategory,
    target: Target,
}

impl ValidSave {
    fn validate(request: SaveRequest) -> Result<Self, StoreError> {
        if request.data.is_empty() {
            return Err(StoreError::invalid("refusing to save an empty payload"));
        }
        let target = match request.name {
            Some(raw) => Target::Named {
                name: FileName::parse(&raw)?,
                overwrite: request.overwrite,
            },
            None => Target::Opaque {
                extension: clean_extension(&request.extension)?,
            },
        };
        Ok(Self {
            data: request.data,
            category: request.category,
            target,
        })
    }
}

pub struct FileStoreBuilder {
    config: StoreConfig,
    roots: Option<StorageRoots>,
    results: Option<ResultContext>,
    work: Option<Arc<dyn BackgroundWork>>,
    exclusion: Option<Arc<dyn BackupExclusion>>,
}

impl FileStoreBuilder {
    /// Uses these roots instead of resolving them from the config.
    pub fn roots(mut self, roots: StorageRoots) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Where completions run. Defaults to a dedicated thread named
    /// [`RESULTS_THREAD_NAME`].
    pub fn results(mut self, results: ResultContext) -> Self {
        self.results = Some(results);
        self
    }

    pub fn background_work(mut self, work: Arc<dyn BackgroundWork>) -> Self {
        self.work = Some(work);
        self
    }

    pub fn backup_exclusion(mut self, exclusion: Arc<dyn BackupExclusion>) -> Self {
        self.exclusion = Some(exclusion);
        self
    }

    pub fn build(self) -> Result<FileStore> {
        let roots = match self.roots {
            Some(roots) => roots,
            None => self.config.resolve_roots()?,
        };
        let layout = StorageLayout::new(roots, self.config.product.clone())?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads.max(1))
            .thread_name(|index| format!("filer-io-{index}"))
            .build()
            .context("Failed to configure file store worker pool")?;
        let results = match self.results {
            Some(results) => results,
            None => ResultContext::dedicated(RESULTS_THREAD_NAME)
                .context("Failed to start the result context thread")?,
        };
        let exclusion = self.exclusion.unwrap_or_else(|| Arc::new(CacheDirTag));
        let work = self.work.unwrap_or_else(|| Arc::new(NoBackgroundWork));

        Ok(FileStore {
            inner: Arc::new(Inner {
                directories: CategoryDirectories::new(layout, exclusion),
                names: NameAllocator::new(self.config.max_name_attempts),
                pool,
                results,
                work,
            }),
        })
    }
}

/// Cheap to clone; clones share the pool, result context and locks.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Inner>,
}

struct Inner {
    directories: CategoryDirectories,
    names: NameAllocator,
    pool: ThreadPool,
    results: ResultContext,
    work: Arc<dyn BackgroundWork>,
}

impl FileStore {
    pub fn builder(config: StoreConfig) -> FileStoreBuilder {
        FileStoreBuilder {
            config,
            roots: None,
            results: None,
            work: None,
            exclusion: None,
        }
    }

    /// Store with default hooks and roots resolved from `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn layout(&self) -> &StorageLayout {
        self.inner.directories.layout()
    }

    /// Category directory path without creating it.
    pub fn directory_for(&self, category: FileCategory) -> PathBuf {
        self.inner.directories.path_for(category)
    }

    /// Resolves and, if needed, creates the category directory on the
    /// calling thread.
    pub fn resolve_directory(&self, category: FileCategory) -> Result<PathBuf, StoreError> {
        self.inner.directories.ensure(category).map(|(dir, _)| dir)
    }

    /// Like [`resolve_directory`](Self::resolve_directory), also reporting
    /// whether the directory had to be created.
    pub fn ensure_directory(
        &self,
        category: FileCategory,
    ) -> Result<(PathBuf, DirState), StoreError> {
        self.inner.directories.ensure(category)
    }

    /// Delivers the category directory, creating it first if needed.
    pub fn resolve_path<F>(&self, category: FileCategory, completion: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.dispatch(
            OperationKind::ResolvePath,
            move |inner| {
                enter(Stage::Resolving);
                inner.directories.ensure(category).map(|(dir, _)| dir)
            },
            completion,
        );
    }

    /// Delivers a path in the kind's category that did not exist when it
    /// was picked: an opaque name without `name`, otherwise `name` or its
    /// first free disambiguated form. Concurrent allocations never receive
    /// the same path; a delivered path stays reserved until a file appears
    /// there or the category is deleted.
    pub fn allocate_unique_path<K, F>(
        &self,
        kind: &K,
        name: Option<&str>,
        completion: F,
    ) -> Result<(), StoreError>
    where
        K: Filer + ?Sized,
        F: FnOnce(Outcome) + Send + 'static,
    {
        let category = kind.category();
        let target = match name {
            Some(raw) => Target::Named {
                name: FileName::parse(raw)?,
                overwrite: false,
            },
            None => Target::Opaque {
                extension: clean_extension(&kind.extension())?,
            },
        };
        self.dispatch(
            OperationKind::Allocate,
            move |inner| {
                enter(Stage::Resolving);
                let (dir, _) = inner.directories.ensure(category)?;
                enter(Stage::Allocating);
                inner
                    .allocate(category, &dir, &target)
                    .map(Reservation::hand_off)
            },
            completion,
        );
        Ok(())
    }

    /// Writes the payload atomically and delivers its final path.
    ///
    /// A named save never disambiguates: an existing file of that name is
    /// replaced when the request allows overwriting and is otherwise a
    /// conflict (`WriteFailed` with `AlreadyExists`).
    pub fn save<F>(&self, request: SaveRequest, completion: F) -> Result<(), StoreError>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let save = ValidSave::validate(request)?;
        self.dispatch(OperationKind::Save, move |inner| inner.save(&save), completion);
        Ok(())
    }

    /// Moves a file into `destination` under its own (possibly
    /// disambiguated) name. The source is removed only after the copy is
    /// safely written; if writing fails the source is untouched.
    pub fn move_file<F>(
        &self,
        source: impl AsRef<Path>,
        destination: FileCategory,
        completion: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let source = checked_path(source.as_ref())?;
        let name = FileName::of_path(&source)?;
        self.dispatch(
            OperationKind::Move,
            move |inner| inner.move_file(&source, &name, destination),
            completion,
        );
        Ok(())
    }

    /// Removes a file or directory and delivers the removed path.
    pub fn delete<F>(&self, path: impl AsRef<Path>, completion: F) -> Result<(), StoreError>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let path = checked_path(path.as_ref())?;
        self.dispatch(
            OperationKind::Delete,
            move |_| {
                enter(Stage::Performing);
                ops::remove_entry(&path)?;
                Ok(path)
            },
            completion,
        );
        Ok(())
    }

    /// Removes the category directory with all its files. An absent
    /// directory is nothing to delete and still succeeds; the next use
    /// recreates it.
    pub fn delete_category<F>(&self, category: FileCategory, completion: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.dispatch(
            OperationKind::DeleteCategory,
            move |inner| {
                enter(Stage::Performing);
                let removed = inner.directories.remove(category)?;
                inner.names.forget(category);
                match removed {
                    Some(dir) => Ok(dir),
                    None => {
                        let dir = inner.directories.path_for(category);
                        debug!(%category, dir = %dir.display(), "nothing to delete");
                        Ok(dir)
                    }
                }
            },
            completion,
        );
    }

    /// Clears every temporary file.
    pub fn purge_temp<F>(&self, completion: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.delete_category(FileCategory::Temp, completion);
    }

    /// Delivers the full contents of a file.
    pub fn read<F>(&self, path: impl AsRef<Path>, completion: F) -> Result<(), StoreError>
    where
        F: FnOnce(Outcome<Vec<u8>>) + Send + 'static,
    {
        let path = checked_path(path.as_ref())?;
        self.dispatch(
            OperationKind::Read,
            move |_| {
                enter(Stage::Performing);
                ops::read_file(&path)
            },
            completion,
        );
        Ok(())
    }

    /// Delivers the files currently stored in a category, sorted by path.
    pub fn list<F>(&self, category: FileCategory, completion: F)
    where
        F: FnOnce(Outcome<Vec<PathBuf>>) + Send + 'static,
    {
        self.dispatch(
            OperationKind::List,
            move |inner| {
                enter(Stage::Performing);
                ops::list_files(&inner.directories.path_for(category))
            },
            completion,
        );
    }

    fn dispatch<T, W, F>(&self, kind: OperationKind, work: W, completion: F)
    where
        T: Send + 'static,
        W: FnOnce(&Inner) -> Outcome<T> + Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let guard = GuardSpan::begin(Arc::clone(&self.inner.work));
        let span = info_span!("file_op", op = %kind);
        span.in_scope(|| enter(Stage::Pending));

        let inner = Arc::clone(&self.inner);
        self.inner.pool.spawn(move || {
            let outcome = span.in_scope(|| {
                let outcome = work(&*inner);
                match &outcome {
                    Ok(_) => debug!(stage = %Stage::Completed, "operation succeeded"),
                    Err(err) => error!(stage = %Stage::Completed, error = %err, "file operation failed"),
                }
                outcome
            });
            let job: Job = Box::new(move || {
                completion(outcome);
                drop(guard);
            });
            if inner.results.post(job).is_err() {
                error!(op = %kind, "result context is closed, completion dropped");
            }
        });
    }
}

impl Inner {
    fn allocate(
        &self,
        category: FileCategory,
        dir: &Path,
        target: &Target,
    ) -> Result<Reservation<'_>, StoreError> {
        match target {
            Target::Opaque { extension } => self.names.opaque(category, dir, extension),
            Target::Named { name, .. } => self.names.named(category, dir, name),
        }
    }

    fn save(&self, save: &ValidSave) -> Outcome {
        enter(Stage::Resolving);
        let (dir, _) = self.directories.ensure(save.category)?;
        match &save.target {
            Target::Named { name, overwrite } => {
                let target = dir.join(name.candidate(0));
                enter(Stage::Performing);
                if *overwrite {
                    ops::clear_for_overwrite(&target)?;
                }
                ops::write_exclusive(&dir, &target, &save.data)?;
                Ok(target)
            }
            opaque @ Target::Opaque { .. } => {
                self.write_unique(save.category, &dir, opaque, &save.data)
            }
        }
    }

    fn move_file(&self, source: &Path, name: &FileName, destination: FileCategory) -> Outcome {
        enter(Stage::Resolving);
        let data = ops::read_file(source)?;
        let (dir, _) = self.directories.ensure(destination)?;
        let target = Target::Named {
            name: name.clone(),
            overwrite: false,
        };
        let moved = self.write_unique(destination, &dir, &target, &data)?;
        enter(Stage::Performing);
        if let Err(err) = ops::remove_entry(source) {
            error!(
                source = %source.display(),
                copy = %moved.display(),
                "copied file but could not remove the original"
            );
            return Err(err);
        }
        Ok(moved)
    }

    /// Allocates and writes until a write wins. Reservations keep writers in
    /// this store apart; the non-clobbering write settles races with anyone
    /// else.
    fn write_unique(
        &self,
        category: FileCategory,
        dir: &Path,
        target: &Target,
        data: &[u8],
    ) -> Outcome {
        let attempts = self.names.max_attempts();
        for _ in 0..attempts {
            enter(Stage::Allocating);
            let reservation = self.allocate(category, dir, target)?;
            enter(Stage::Performing);
            match ops::write_exclusive(dir, reservation.path(), data) {
                Ok(()) => return Ok(reservation.path().to_path_buf()),
                Err(err) if err.is_conflict() => {
                    debug!(
                        path = %reservation.path().display(),
                        "name taken before write, allocating again"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::AllocationExhausted {
            dir: dir.to_path_buf(),
            attempts,
        })
    }
}

fn checked_path(path: &Path) -> Result<PathBuf, StoreError> {
    if path.as_os_str().is_empty() {
        return Err(StoreError::invalid("path is empty"));
    }
    if !path.is_absolute() {
        return Err(StoreError::invalid(format!(
            "{} is not an absolute path",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}
