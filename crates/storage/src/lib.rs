//! Persistence for study sessions: an in-memory store and an `SQLite` store
//! behind the same repository trait.

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, SessionHeader, SessionRecord, SessionRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
