//! Shelfwatch: a book catalog crawler with change detection
//!
//! This crate crawls an online book catalog category by category, persists
//! each book with a content hash over its tracked fields, and on later
//! cycles detects and records field-level changes (price, availability,
//! rating, review count) in an append-only change log.

pub mod config;
pub mod crawler;
pub mod detect;
pub mod extract;
pub mod model;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for shelfwatch operations
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable failure that aborts the whole run; the durable crawl
    /// state is left intact for a later resume
    #[error("Fatal error during {stage}: {message}")]
    Fatal { stage: String, message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for shelfwatch operations
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlSummary, RetryPolicy};
pub use detect::{run_change_detection, DetectionSummary};
pub use model::{Book, ChangeRecord, ChangeType, CrawlState, CrawlStatus};
pub use storage::{SqliteStorage, Storage};
