use filer::store::RESULTS_THREAD_NAME;
use filer::{
    FileCategory, FileStore, Filer, Outcome, SaveRequest, StorageRoots, StoreConfig, StoreError,
    TrackedWork,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

type Done<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

pub struct IntegrationHarness {
    workspace: TempDir,
    pub work: Arc<TrackedWork>,
    pub store: FileStore,
}

impl IntegrationHarness {
    pub fn new() -> Self {
        let workspace = TempDir::new().expect("failed to create temp workspace");
        let work = Arc::new(TrackedWork::new());
        let store = FileStore::builder(StoreConfig::default())
            .roots(StorageRoots::under(workspace.path()))
            .background_work(work.clone())
            .build()
            .expect("failed to build file store for tests");
        Self {
            workspace,
            work,
            store,
        }
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Writes a file outside the store, for moves.
    pub fn outside_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let dir = self.workspace.path().join("incoming");
        std::fs::create_dir_all(&dir).expect("failed to create incoming dir");
        let path = dir.join(name);
        std::fs::write(&path, data).expect("failed to write incoming file");
        path
    }

    pub fn save(&self, request: SaveRequest) -> Outcome {
        run(|done| self.store.save(request, done))
    }

    pub fn save_named(
        &self,
        category: FileCategory,
        name: &str,
        data: &[u8],
        overwrite: bool,
    ) -> Outcome {
        self.save(
            SaveRequest::new(data.to_vec(), &category)
                .named(name)
                .overwrite(overwrite),
        )
    }

    pub fn move_file(&self, source: &Path, category: FileCategory) -> Outcome {
        run(|done| self.store.move_file(source, category, done))
    }

    pub fn delete(&self, path: &Path) -> Outcome {
        run(|done| self.store.delete(path, done))
    }

    pub fn delete_category(&self, category: FileCategory) -> Outcome {
        run(|done| {
            self.store.delete_category(category, done);
            Ok(())
        })
    }

    pub fn resolve_path(&self, category: FileCategory) -> Outcome {
        run(|done| {
            self.store.resolve_path(category, done);
            Ok(())
        })
    }

    pub fn allocate<K: Filer + ?Sized>(&self, kind: &K, name: Option<&str>) -> Outcome {
        run(|done| self.store.allocate_unique_path(kind, name, done))
    }

    pub fn read(&self, path: &Path) -> Outcome<Vec<u8>> {
        run(|done| self.store.read(path, done))
    }

    pub fn list(&self, category: FileCategory) -> Outcome<Vec<PathBuf>> {
        run(|done| {
            self.store.list(category, done);
            Ok(())
        })
    }

    pub fn wait_idle(&self) {
        assert!(
            self.work.wait_idle(COMPLETION_TIMEOUT),
            "background work still in flight"
        );
    }
}

/// Starts an operation and blocks until its completion fires, checking it
/// ran on the result thread.
pub fn run<T, S>(start: S) -> Outcome<T>
where
    T: Send + 'static,
    S: FnOnce(Done<T>) -> Result<(), StoreError>,
{
    let (tx, rx) = mpsc::channel();
    start(Box::new(move |outcome| {
        let thread_name = thread::current().name().map(str::to_string);
        let _ = tx.send((thread_name, outcome));
    }))
    .expect("operation was rejected before dispatch");
    let (thread_name, outcome) = rx
        .recv_timeout(COMPLETION_TIMEOUT)
        .expect("completion was not delivered");
    assert_eq!(thread_name.as_deref(), Some(RESULTS_THREAD_NAME));
    outcome
}

mod allocation;
mod concurrency;
mod move_files;
