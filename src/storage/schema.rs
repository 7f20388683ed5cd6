//! Database schema definitions
//!
//! All SQL schema definitions for the shelfwatch database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per catalog book; url is the entity identity
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL,
    price_excl_tax REAL NOT NULL,
    price_incl_tax REAL NOT NULL,
    availability TEXT NOT NULL,
    num_reviews INTEGER NOT NULL,
    image_url TEXT NOT NULL,
    rating INTEGER NOT NULL,
    crawl_timestamp TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    content_hash TEXT NOT NULL,
    raw_html TEXT
);

CREATE INDEX IF NOT EXISTS idx_books_category ON books(category);
CREATE INDEX IF NOT EXISTS idx_books_content_hash ON books(content_hash);

-- Singleton crawl position per crawl type, read at start to resume
CREATE TABLE IF NOT EXISTS crawl_state (
    state_type TEXT PRIMARY KEY,
    last_category TEXT,
    last_page INTEGER NOT NULL DEFAULT 1,
    last_book_url TEXT,
    total_books_crawled INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Append-only change log
CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_url TEXT NOT NULL,
    change_type TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_changes_detected_at ON changes(detected_at);
CREATE INDEX IF NOT EXISTS idx_changes_book_url ON changes(book_url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["books", "crawl_state", "changes"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
