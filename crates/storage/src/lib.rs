#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AttemptCacheRepository, CachedAttempt, CheckpointSnapshotRepository, InMemoryRepository,
    Storage, StorageError,
};
pub use sqlite::SqliteInitError;
