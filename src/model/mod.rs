//! Domain entities: books, crawl state, change events

pub mod book;
pub mod change;
pub mod crawl_state;

pub use book::{Book, ParseResult, ValidationError};
pub use change::{ChangeRecord, ChangeType};
pub use crawl_state::{CrawlState, CrawlStatus};
