pub mod backup;
pub mod category;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod guard;
pub mod layout;
pub mod logging;
pub mod names;
pub mod operation;
mod ops;
pub mod store;

// Re-export commonly used types for convenience.
pub use category::{FileCategory, Filer, RootArea};
pub use config::StoreConfig;
pub use context::{ResultContext, ResultPump};
pub use error::StoreError;
pub use guard::{BackgroundWork, NoBackgroundWork, TrackedWork, WorkToken};
pub use layout::{StorageLayout, StorageRoots};
pub use store::{FileStore, FileStoreBuilder, Outcome, SaveRequest};
