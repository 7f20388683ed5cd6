//! Crawl engine: HTTP fetching with retry, and the crawl coordinator

pub mod coordinator;
pub mod fetcher;

pub use coordinator::{run_crawl, Coordinator, CrawlSummary};
pub use fetcher::{build_http_client, fetch_with_retry, FetchError, Fetched, RetryPolicy};
