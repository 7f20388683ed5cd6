//! SQLite storage implementation
//!
//! SQLite-based implementation of the Storage trait.

use crate::model::{Book, ChangeRecord, ChangeType, CrawlState, CrawlStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::ShelfError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ShelfError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ShelfError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, ShelfError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
        let crawl_timestamp: String = row.get(10)?;
        Ok(Book {
            url: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            price_excl_tax: row.get(4)?,
            price_incl_tax: row.get(5)?,
            availability: row.get(6)?,
            num_reviews: row.get(7)?,
            image_url: row.get(8)?,
            rating: row.get(9)?,
            crawl_timestamp: crawl_timestamp
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            status: row.get(11)?,
            content_hash: row.get(12)?,
            raw_html: row.get(13)?,
        })
    }

    fn row_to_change(row: &Row<'_>) -> rusqlite::Result<ChangeRecord> {
        let change_type: String = row.get(1)?;
        let old_value: Option<String> = row.get(2)?;
        let new_value: Option<String> = row.get(3)?;
        let detected_at: String = row.get(4)?;

        Ok(ChangeRecord {
            book_url: row.get(0)?,
            change_type: ChangeType::from_db_string(&change_type)
                .unwrap_or(ChangeType::NewBook),
            old_value: old_value.map(parse_json_value),
            new_value: new_value.map(parse_json_value),
            detected_at: detected_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

/// Decodes a stored JSON value, falling back to a plain string
fn parse_json_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// Encodes an optional JSON value for storage
fn encode_json_value(value: &Option<Value>) -> StorageResult<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).map_err(|e| StorageError::Serialization(e.to_string())))
        .transpose()
}

const BOOK_COLUMNS: &str = "url, title, description, category, price_excl_tax, price_incl_tax,
     availability, num_reviews, image_url, rating, crawl_timestamp, status, content_hash, raw_html";

impl Storage for SqliteStorage {
    // ===== Books =====

    fn insert_book(&mut self, book: &Book) -> StorageResult<bool> {
        // INSERT OR IGNORE makes a duplicate-URL race resolve to
        // "second writer loses" without application-level locking.
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO books
             (url, title, description, category, price_excl_tax, price_incl_tax,
              availability, num_reviews, image_url, rating, crawl_timestamp, status,
              content_hash, raw_html)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                book.url,
                book.title,
                book.description,
                book.category,
                book.price_excl_tax,
                book.price_incl_tax,
                book.availability,
                book.num_reviews,
                book.image_url,
                book.rating,
                book.crawl_timestamp.to_rfc3339(),
                book.status,
                book.content_hash,
                book.raw_html,
            ],
        )?;

        Ok(inserted == 1)
    }

    fn get_book_by_url(&self, url: &str) -> StorageResult<Option<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM books WHERE url = ?1",
            BOOK_COLUMNS
        ))?;

        let book = stmt
            .query_row(params![url], Self::row_to_book)
            .optional()?;

        Ok(book)
    }

    fn list_books(&self) -> StorageResult<Vec<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM books ORDER BY url", BOOK_COLUMNS))?;

        let books = stmt
            .query_map([], Self::row_to_book)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }

    fn replace_book(&mut self, book: &Book) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE books SET title = ?1, description = ?2, category = ?3,
             price_excl_tax = ?4, price_incl_tax = ?5, availability = ?6,
             num_reviews = ?7, image_url = ?8, rating = ?9, crawl_timestamp = ?10,
             status = ?11, content_hash = ?12, raw_html = ?13
             WHERE url = ?14",
            params![
                book.title,
                book.description,
                book.category,
                book.price_excl_tax,
                book.price_incl_tax,
                book.availability,
                book.num_reviews,
                book.image_url,
                book.rating,
                book.crawl_timestamp.to_rfc3339(),
                book.status,
                book.content_hash,
                book.raw_html,
                book.url,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::BookNotFound(book.url.clone()));
        }

        Ok(())
    }

    fn count_books(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_books_by_category(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT category, COUNT(*) FROM books GROUP BY category")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (category, count) = row?;
            counts.insert(category, count as u64);
        }

        Ok(counts)
    }

    // ===== Change log =====

    fn append_change(&mut self, change: &ChangeRecord) -> StorageResult<()> {
        let old_value = encode_json_value(&change.old_value)?;
        let new_value = encode_json_value(&change.new_value)?;

        self.conn.execute(
            "INSERT INTO changes (book_url, change_type, old_value, new_value, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                change.book_url,
                change.change_type.to_db_string(),
                old_value,
                new_value,
                change.detected_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn recent_changes(&self, limit: u32) -> StorageResult<Vec<ChangeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT book_url, change_type, old_value, new_value, detected_at
             FROM changes ORDER BY id DESC LIMIT ?1",
        )?;

        let changes = stmt
            .query_map(params![limit], Self::row_to_change)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(changes)
    }

    fn count_changes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM changes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_changes_by_type(&self) -> StorageResult<HashMap<ChangeType, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT change_type, COUNT(*) FROM changes GROUP BY change_type")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (type_str, count) = row?;
            if let Some(change_type) = ChangeType::from_db_string(&type_str) {
                counts.insert(change_type, count as u64);
            }
        }

        Ok(counts)
    }

    // ===== Crawl state =====

    fn get_crawl_state(&self, state_type: &str) -> StorageResult<Option<CrawlState>> {
        let mut stmt = self.conn.prepare(
            "SELECT state_type, last_category, last_page, last_book_url,
             total_books_crawled, started_at, updated_at, status
             FROM crawl_state WHERE state_type = ?1",
        )?;

        let state = stmt
            .query_row(params![state_type], |row| {
                let started_at: String = row.get(5)?;
                let updated_at: String = row.get(6)?;
                let status: String = row.get(7)?;

                Ok(CrawlState {
                    state_type: row.get(0)?,
                    last_category: row.get(1)?,
                    last_page: row.get(2)?,
                    last_book_url: row.get(3)?,
                    total_books_crawled: row.get::<_, i64>(4)? as u64,
                    started_at: started_at
                        .parse::<DateTime<Utc>>()
                        .unwrap_or_else(|_| Utc::now()),
                    updated_at: updated_at
                        .parse::<DateTime<Utc>>()
                        .unwrap_or_else(|_| Utc::now()),
                    status: CrawlStatus::from_db_string(&status)
                        .unwrap_or(CrawlStatus::InProgress),
                })
            })
            .optional()?;

        Ok(state)
    }

    fn upsert_crawl_state(&mut self, state: &CrawlState) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO crawl_state
             (state_type, last_category, last_page, last_book_url, total_books_crawled,
              started_at, updated_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(state_type) DO UPDATE SET
               last_category = excluded.last_category,
               last_page = excluded.last_page,
               last_book_url = excluded.last_book_url,
               total_books_crawled = excluded.total_books_crawled,
               updated_at = excluded.updated_at,
               status = excluded.status",
            params![
                state.state_type,
                state.last_category,
                state.last_page,
                state.last_book_url,
                state.total_books_crawled as i64,
                state.started_at.to_rfc3339(),
                state.updated_at.to_rfc3339(),
                state.status.to_db_string(),
            ],
        )?;

        Ok(())
    }

    fn delete_crawl_state(&mut self, state_type: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM crawl_state WHERE state_type = ?1",
            params![state_type],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_book(url: &str) -> Book {
        let mut book = Book {
            url: url.to_string(),
            title: "A Light in the Attic".to_string(),
            description: None,
            category: "Poetry".to_string(),
            price_excl_tax: 51.77,
            price_incl_tax: 51.77,
            availability: "In stock (22 available)".to_string(),
            num_reviews: 0,
            image_url: "https://books.toscrape.com/media/cover.jpg".to_string(),
            rating: 3,
            crawl_timestamp: Utc::now(),
            status: "active".to_string(),
            content_hash: String::new(),
            raw_html: None,
        };
        book.refresh_content_hash();
        book
    }

    #[test]
    fn test_insert_and_get_book() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let book = sample_book("https://example.com/book1");

        assert!(storage.insert_book(&book).unwrap());

        let loaded = storage
            .get_book_by_url("https://example.com/book1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.title, book.title);
        assert_eq!(loaded.price_incl_tax, book.price_incl_tax);
        assert_eq!(loaded.content_hash, book.content_hash);
        assert_eq!(loaded.rating, 3);
    }

    #[test]
    fn test_insert_duplicate_is_benign_skip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let book = sample_book("https://example.com/book1");

        assert!(storage.insert_book(&book).unwrap());
        assert!(!storage.insert_book(&book).unwrap());
        assert_eq!(storage.count_books().unwrap(), 1);
    }

    #[test]
    fn test_get_missing_book_is_none() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage
            .get_book_by_url("https://example.com/missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_replace_book_updates_mutable_fields() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut book = sample_book("https://example.com/book1");
        storage.insert_book(&book).unwrap();

        book.price_incl_tax = 8.99;
        book.availability = "Out of stock".to_string();
        book.refresh_content_hash();
        storage.replace_book(&book).unwrap();

        let loaded = storage
            .get_book_by_url("https://example.com/book1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.price_incl_tax, 8.99);
        assert_eq!(loaded.availability, "Out of stock");
        assert_eq!(loaded.content_hash, book.content_hash);
    }

    #[test]
    fn test_replace_missing_book_fails() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let book = sample_book("https://example.com/nope");
        assert!(matches!(
            storage.replace_book(&book),
            Err(StorageError::BookNotFound(_))
        ));
    }

    #[test]
    fn test_changes_are_returned_newest_first() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        for price in [10.0, 11.0, 12.0] {
            let change = ChangeRecord::field_change(
                "https://example.com/book1",
                ChangeType::PriceChange,
                serde_json::json!(price - 1.0),
                serde_json::json!(price),
            );
            storage.append_change(&change).unwrap();
        }

        let changes = storage.recent_changes(2).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].new_value, Some(serde_json::json!(12.0)));
        assert_eq!(changes[1].new_value, Some(serde_json::json!(11.0)));
        assert_eq!(storage.count_changes().unwrap(), 3);
    }

    #[test]
    fn test_new_book_change_round_trips_null_old_value() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let change = ChangeRecord::new_book("https://example.com/b", "T", "Poetry", 9.99);
        storage.append_change(&change).unwrap();

        let loaded = storage.recent_changes(10).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].change_type, ChangeType::NewBook);
        assert!(loaded[0].old_value.is_none());
        assert_eq!(loaded[0].new_value.as_ref().unwrap()["price"], 9.99);
    }

    #[test]
    fn test_crawl_state_round_trip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage
            .get_crawl_state(CrawlState::CRAWLER)
            .unwrap()
            .is_none());

        let mut state = CrawlState::new();
        state.last_category = Some("Poetry".to_string());
        state.last_page = 3;
        state.total_books_crawled = 42;
        storage.upsert_crawl_state(&state).unwrap();

        let loaded = storage
            .get_crawl_state(CrawlState::CRAWLER)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.last_category.as_deref(), Some("Poetry"));
        assert_eq!(loaded.last_page, 3);
        assert_eq!(loaded.total_books_crawled, 42);
        assert_eq!(loaded.status, CrawlStatus::InProgress);

        // Upsert replaces the singleton rather than adding a row
        state.last_page = 4;
        storage.upsert_crawl_state(&state).unwrap();
        let loaded = storage
            .get_crawl_state(CrawlState::CRAWLER)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.last_page, 4);

        storage.delete_crawl_state(CrawlState::CRAWLER).unwrap();
        assert!(storage
            .get_crawl_state(CrawlState::CRAWLER)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_count_books_by_category() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.insert_book(&sample_book("https://e.com/1")).unwrap();
        storage.insert_book(&sample_book("https://e.com/2")).unwrap();

        let mut other = sample_book("https://e.com/3");
        other.category = "Travel".to_string();
        storage.insert_book(&other).unwrap();

        let counts = storage.count_books_by_category().unwrap();
        assert_eq!(counts.get("Poetry"), Some(&2));
        assert_eq!(counts.get("Travel"), Some(&1));
    }

    #[test]
    fn test_count_changes_by_type() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .append_change(&ChangeRecord::new_book("https://e.com/1", "T", "C", 1.0))
            .unwrap();
        storage
            .append_change(&ChangeRecord::field_change(
                "https://e.com/1",
                ChangeType::PriceChange,
                serde_json::json!(1.0),
                serde_json::json!(2.0),
            ))
            .unwrap();
        storage
            .append_change(&ChangeRecord::field_change(
                "https://e.com/1",
                ChangeType::PriceChange,
                serde_json::json!(2.0),
                serde_json::json!(3.0),
            ))
            .unwrap();

        let counts = storage.count_changes_by_type().unwrap();
        assert_eq!(counts.get(&ChangeType::NewBook), Some(&1));
        assert_eq!(counts.get(&ChangeType::PriceChange), Some(&2));
    }
}
