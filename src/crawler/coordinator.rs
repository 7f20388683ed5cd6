//! Crawl coordinator - category/page traversal with resume
//!
//! One coordinating task walks categories and pages strictly in order.
//! Within a page, book URLs are fetched, parsed and stored by a bounded
//! pool of workers; the batch fully drains before progress is persisted
//! and before the next page starts, so an interrupted run redoes at most
//! one page of work.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_with_retry, RetryPolicy};
use crate::extract::{next_page_url, parse_book_page, parse_category_index, parse_listing_page};
use crate::model::{ChangeRecord, CrawlState};
use crate::storage::{SqliteStorage, Storage};
use crate::ShelfError;
use chrono::Utc;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Outcome counts of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages and book pages fetched successfully
    pub fetched: u64,

    /// Books newly stored
    pub stored: u64,

    /// Books skipped because their URL was already persisted
    pub duplicates_skipped: u64,

    /// Books that failed to fetch, parse or validate
    pub failed: u64,

    /// Categories fully crawled this run
    pub categories_crawled: u64,
}

/// Batch counters shared between workers; the only mutable state besides
/// storage that crosses task boundaries
#[derive(Default)]
struct Counters {
    fetched: AtomicU64,
    stored: AtomicU64,
    duplicates: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self, categories_crawled: u64) -> CrawlSummary {
        CrawlSummary {
            fetched: self.fetched.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            categories_crawled,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
    policy: RetryPolicy,
    counters: Arc<Counters>,
}

impl Coordinator {
    /// Creates a new coordinator over an already-opened storage backend
    pub fn new(
        config: Config,
        storage: Arc<Mutex<SqliteStorage>>,
    ) -> Result<Self, ShelfError> {
        let client = build_http_client(&config.crawler)?;
        let policy = RetryPolicy::from_config(&config.retry);

        Ok(Self {
            config: Arc::new(config),
            storage,
            client,
            policy,
            counters: Arc::new(Counters::default()),
        })
    }

    /// Runs one crawl of the whole catalog
    ///
    /// # Crawl flow
    ///
    /// 1. Load or create the durable crawl state (resume marker)
    /// 2. Fetch the site root and extract the category list; a root or
    ///    listing page fetch failure after retries aborts the run and
    ///    leaves the state durable
    /// 3. Per category, per page: fetch, extract book URLs, process the
    ///    batch under the bounded worker pool, checkpoint progress
    /// 4. Delete the crawl state on full completion and report the summary
    ///
    /// # Arguments
    ///
    /// * `resume` - Whether to resume from a previous interrupted run;
    ///   `false` discards any stored crawl state first
    pub async fn run(&self, resume: bool) -> Result<CrawlSummary, ShelfError> {
        let base_url = self.config.site.base_url.clone();
        tracing::info!("Starting book crawl of {}", base_url);
        tracing::info!(
            "Concurrent requests: {}, retry attempts: {}",
            self.config.crawler.concurrent_requests,
            self.policy.max_attempts
        );
        let start_time = std::time::Instant::now();

        // Load or create the resume state
        let mut state = {
            let mut storage = self.storage.lock().unwrap();
            if !resume {
                storage.delete_crawl_state(CrawlState::CRAWLER)?;
            }
            match storage.get_crawl_state(CrawlState::CRAWLER)? {
                Some(existing) => {
                    tracing::info!(
                        "Resuming previous crawl: category={:?}, page={}",
                        existing.last_category,
                        existing.last_page
                    );
                    existing
                }
                None => {
                    let fresh = CrawlState::new();
                    storage.upsert_crawl_state(&fresh)?;
                    fresh
                }
            }
        };

        // Fetch the site root; this is the one fetch whose failure is fatal
        tracing::info!("Fetching category list...");
        let homepage = fetch_with_retry(&self.client, &base_url, &self.policy)
            .await
            .map_err(|e| ShelfError::Fatal {
                stage: "homepage fetch".to_string(),
                message: e.to_string(),
            })?;

        let categories = parse_category_index(&homepage.body, &base_url);
        if categories.is_empty() {
            return Err(ShelfError::Fatal {
                stage: "category extraction".to_string(),
                message: "no categories found on site root".to_string(),
            });
        }
        tracing::info!("Found {} categories to crawl", categories.len());

        // Category-skip-until-match resume. This assumes the site
        // enumerates categories in a stable order across runs; if the
        // order changes, unvisited categories before the marker are
        // skipped. Known limitation.
        let mut skip_until = state.last_category.clone();
        let mut categories_crawled = 0u64;

        for (name, url) in &categories {
            let start_page = match &skip_until {
                Some(target) if name != target => {
                    tracing::info!("Skipping category: {} (already crawled)", name);
                    continue;
                }
                Some(_) => {
                    skip_until = None;
                    state.last_page.max(1)
                }
                None => 1,
            };

            tracing::info!("Crawling category: {} (from page {})", name, start_page);
            self.crawl_category(name, url, start_page, &mut state)
                .await?;
            categories_crawled += 1;
        }

        // Full successful completion: the resume marker goes away
        {
            let mut storage = self.storage.lock().unwrap();
            storage.delete_crawl_state(CrawlState::CRAWLER)?;
        }

        let summary = self.counters.snapshot(categories_crawled);
        tracing::info!(
            "Crawl completed in {:?}: {} fetched, {} stored, {} duplicates skipped, {} failed",
            start_time.elapsed(),
            summary.fetched,
            summary.stored,
            summary.duplicates_skipped,
            summary.failed
        );

        Ok(summary)
    }

    /// Crawls all pages of one category, handling pagination
    async fn crawl_category(
        &self,
        category: &str,
        category_url: &str,
        start_page: u32,
        state: &mut CrawlState,
    ) -> Result<(), ShelfError> {
        let mut current_url = page_url(category_url, start_page);
        let mut page = start_page;

        loop {
            tracing::info!("Crawling page {}: {}", page, current_url);

            let listing = match fetch_with_retry(&self.client, &current_url, &self.policy).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    // A lost listing page aborts the run; progress up to
                    // the previous page is durable and the next invocation
                    // resumes from there.
                    tracing::error!("Failed to fetch listing page {}: {}", current_url, e);
                    return Err(ShelfError::Fatal {
                        stage: format!("category page fetch ({})", category),
                        message: e.to_string(),
                    });
                }
            };

            let book_urls = parse_listing_page(&listing.body, &self.config.site.base_url);
            if book_urls.is_empty() {
                // Natural end of pagination, not an error
                tracing::info!("No books on page {} of {}", page, category);
                return Ok(());
            }

            self.process_batch(category, &book_urls).await;

            // Checkpoint unconditionally after the batch drains, regardless
            // of individual worker outcomes
            state.last_category = Some(category.to_string());
            state.last_page = page;
            state.last_book_url = book_urls.last().cloned();
            state.total_books_crawled = self.counters.stored.load(Ordering::Relaxed);
            state.updated_at = Utc::now();
            {
                let mut storage = self.storage.lock().unwrap();
                storage.upsert_crawl_state(state)?;
            }

            match next_page_url(&listing.body) {
                Some(relative) => {
                    current_url = join_sibling(&current_url, &relative);
                    page += 1;
                }
                None => {
                    tracing::info!("No more pages in category: {}", category);
                    return Ok(());
                }
            }
        }
    }

    /// Fetches, parses and stores one page's books under the bounded pool
    ///
    /// Worker completion order is unspecified, but the batch fully drains
    /// before this method returns. Per-URL failures stay contained here.
    async fn process_batch(&self, category: &str, book_urls: &[String]) {
        let semaphore = Arc::new(Semaphore::new(
            self.config.crawler.concurrent_requests as usize,
        ));
        let mut handles = Vec::with_capacity(book_urls.len());

        for url in book_urls {
            let permit_source = Arc::clone(&semaphore);
            let client = self.client.clone();
            let policy = self.policy;
            let storage = Arc::clone(&self.storage);
            let counters = Arc::clone(&self.counters);
            let base_url = self.config.site.base_url.clone();
            let category = category.to_string();
            let url = url.clone();

            handles.push(tokio::spawn(async move {
                // The semaphore lives as long as the batch, so acquire
                // only fails if it was closed; treat that as a no-op.
                let _permit = match permit_source.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                process_book(&client, &policy, &storage, &counters, &base_url, &category, &url)
                    .await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Batch worker panicked: {}", e);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Processes one book URL: skip duplicates, fetch, parse, validate, store
async fn process_book(
    client: &Client,
    policy: &RetryPolicy,
    storage: &Arc<Mutex<SqliteStorage>>,
    counters: &Counters,
    base_url: &str,
    category: &str,
    url: &str,
) {
    // Already persisted: skip without fetching
    let existing = {
        let storage = storage.lock().unwrap();
        storage.get_book_by_url(url)
    };
    match existing {
        Ok(Some(_)) => {
            tracing::debug!("Book already exists: {}", url);
            counters.duplicates.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Storage lookup failed for {}: {}", url, e);
            counters.failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }

    let fetched = match fetch_with_retry(client, url, policy).await {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::error!("Failed to fetch book {}: {}", url, e);
            counters.failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    counters.fetched.fetch_add(1, Ordering::Relaxed);

    let result = parse_book_page(&fetched.body, url, base_url);
    let mut book = match result.book {
        Some(book) => book,
        None => {
            tracing::error!(
                "Failed to parse book {}: {}",
                url,
                result.error.unwrap_or_default()
            );
            counters.failed.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    // The breadcrumb can disagree with the category being crawled
    book.category = category.to_string();
    book.refresh_content_hash();

    if let Err(e) = book.validate() {
        tracing::warn!("Rejecting invalid book {}: {}", url, e);
        counters.failed.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let mut storage = storage.lock().unwrap();
    match storage.insert_book(&book) {
        Ok(true) => {
            counters.stored.fetch_add(1, Ordering::Relaxed);
            let event =
                ChangeRecord::new_book(&book.url, &book.title, &book.category, book.price_incl_tax);
            if let Err(e) = storage.append_change(&event) {
                tracing::error!("Failed to record new-book change for {}: {}", url, e);
            }
            tracing::info!("Saved book: {}", book.title);
        }
        Ok(false) => {
            // Duplicate race: second writer loses, benign skip
            counters.duplicates.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            tracing::error!("Failed to store book {}: {}", url, e);
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Builds the URL of page `n` within a category
///
/// Listing pages on the target site are `index.html` for page 1 and
/// `page-N.html` for the rest, siblings of the category index.
fn page_url(category_url: &str, page: u32) -> String {
    if page <= 1 {
        return category_url.to_string();
    }
    join_sibling(category_url, &format!("page-{}.html", page))
}

/// Replaces the final path segment of `url` with `sibling`
fn join_sibling(url: &str, sibling: &str) -> String {
    match url.rsplit_once('/') {
        Some((prefix, _)) => format!("{}/{}", prefix, sibling),
        None => sibling.to_string(),
    }
}

/// Runs one crawl with a freshly opened storage backend
///
/// This is the entry point exposed to the scheduling collaborator; it is
/// idempotent against an unchanged source because entity insertion is
/// "insert if URL absent".
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `resume` - Whether to resume a previous interrupted run
pub async fn run_crawl(config: Config, resume: bool) -> Result<CrawlSummary, ShelfError> {
    let storage = SqliteStorage::new(std::path::Path::new(&config.output.database_path))?;
    let coordinator = Coordinator::new(config, Arc::new(Mutex::new(storage)))?;
    coordinator.run(resume).await
}
