//! Persistence gateway: storage trait and SQLite backend

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};
