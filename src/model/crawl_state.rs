//! Durable crawl position for resume support
//!
//! One singleton row per crawl type. The coordinator upserts it after every
//! page and deletes it when a run completes, so an interrupted crawl redoes
//! at most one page of work.

use chrono::{DateTime, Utc};

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    InProgress,
    Completed,
}

impl CrawlStatus {
    /// Converts to the database string representation
    pub fn to_db_string(self) -> &'static str {
        match self {
            CrawlStatus::InProgress => "in_progress",
            CrawlStatus::Completed => "completed",
        }
    }

    /// Parses from the database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(CrawlStatus::InProgress),
            "completed" => Some(CrawlStatus::Completed),
            _ => None,
        }
    }
}

/// Durable marker of the furthest category/page reached
#[derive(Debug, Clone)]
pub struct CrawlState {
    /// State identifier; one singleton per crawl type
    pub state_type: String,

    /// Last category crawled
    pub last_category: Option<String>,

    /// Last page number reached within that category
    pub last_page: u32,

    /// Last book URL processed
    pub last_book_url: Option<String>,

    /// Running total of books stored across the run
    pub total_books_crawled: u64,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: CrawlStatus,
}

impl CrawlState {
    /// The singleton key used by the book crawler
    pub const CRAWLER: &'static str = "crawler";

    /// Creates a fresh in-progress state
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state_type: Self::CRAWLER.to_string(),
            last_category: None,
            last_page: 1,
            last_book_url: None,
            total_books_crawled: 0,
            started_at: now,
            updated_at: now,
            status: CrawlStatus::InProgress,
        }
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_starts_at_page_one() {
        let state = CrawlState::new();
        assert_eq!(state.last_page, 1);
        assert_eq!(state.status, CrawlStatus::InProgress);
        assert!(state.last_category.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [CrawlStatus::InProgress, CrawlStatus::Completed] {
            assert_eq!(
                CrawlStatus::from_db_string(status.to_db_string()),
                Some(status)
            );
        }
        assert_eq!(CrawlStatus::from_db_string("bogus"), None);
    }
}
