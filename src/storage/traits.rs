//! Storage trait and error types
//!
//! The trait is the consumed persistence-gateway interface: the crawler,
//! detector and report code depend only on it, never on SQLite directly.

use crate::model::{Book, ChangeRecord, ChangeType, CrawlState};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// All methods the crawler and detector need from the persistent store.
pub trait Storage {
    // ===== Books =====

    /// Inserts a book if its URL is absent
    ///
    /// Returns `true` when the book was inserted, `false` when a book with
    /// the same URL already exists (a benign duplicate skip, not an error).
    fn insert_book(&mut self, book: &Book) -> StorageResult<bool>;

    /// Gets a book by its canonical URL
    fn get_book_by_url(&self, url: &str) -> StorageResult<Option<Book>>;

    /// Lists every persisted book, ordered by URL
    fn list_books(&self) -> StorageResult<Vec<Book>>;

    /// Replaces the mutable fields of an existing book
    ///
    /// Identity (URL) is unchanged; the caller must have refreshed the
    /// content hash before calling.
    fn replace_book(&mut self, book: &Book) -> StorageResult<()>;

    /// Counts all persisted books
    fn count_books(&self) -> StorageResult<u64>;

    /// Counts books per category
    fn count_books_by_category(&self) -> StorageResult<HashMap<String, u64>>;

    // ===== Change log =====

    /// Appends one change record; the log is append-only
    fn append_change(&mut self, change: &ChangeRecord) -> StorageResult<()>;

    /// Returns the most recent changes, newest first
    fn recent_changes(&self, limit: u32) -> StorageResult<Vec<ChangeRecord>>;

    /// Counts all recorded changes
    fn count_changes(&self) -> StorageResult<u64>;

    /// Counts changes per change type
    fn count_changes_by_type(&self) -> StorageResult<HashMap<ChangeType, u64>>;

    // ===== Crawl state =====

    /// Reads the singleton crawl state, if present
    fn get_crawl_state(&self, state_type: &str) -> StorageResult<Option<CrawlState>>;

    /// Creates or updates the singleton crawl state
    fn upsert_crawl_state(&mut self, state: &CrawlState) -> StorageResult<()>;

    /// Deletes the singleton crawl state (on successful completion)
    fn delete_crawl_state(&mut self, state_type: &str) -> StorageResult<()>;
}
