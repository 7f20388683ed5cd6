//! Change detection over already-persisted books
//!
//! Re-fetches every stored book sequentially, short-circuits on an
//! unchanged content hash, and appends one ChangeRecord per differing
//! tracked field. The change log is append-only; the book row itself is
//! replaced only when at least one change was found.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_with_retry, RetryPolicy};
use crate::extract::parse_book_page;
use crate::model::{Book, ChangeRecord, ChangeType};
use crate::storage::{SqliteStorage, Storage};
use crate::ShelfError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Outcome counts of one detection cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    /// Stored books examined
    pub checked: u64,

    /// Books whose content hash matched (fast path, no field compare)
    pub unchanged: u64,

    /// Books skipped because their page failed to fetch or parse
    pub skipped: u64,

    /// Price changes recorded
    pub price_changes: u64,

    /// Availability changes recorded
    pub availability_changes: u64,

    /// Rating changes recorded
    pub rating_changes: u64,

    /// Review-count changes recorded
    pub reviews_changes: u64,

    /// New books recorded; new-book events are written at crawl time, so
    /// this stays zero in a standalone detection cycle
    pub new_books: u64,

    /// Total change records appended this cycle
    pub total_changes: u64,
}

/// Runs one change-detection cycle over every stored book
///
/// # Arguments
///
/// * `config` - The crawler configuration (client settings, retry policy,
///   database path)
pub async fn run_change_detection(config: &Config) -> Result<DetectionSummary, ShelfError> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let storage = Arc::new(Mutex::new(storage));
    detect_changes(config, &storage).await
}

/// Detection cycle against an already-opened storage backend
pub async fn detect_changes(
    config: &Config,
    storage: &Arc<Mutex<SqliteStorage>>,
) -> Result<DetectionSummary, ShelfError> {
    let client = build_http_client(&config.crawler)?;
    let policy = RetryPolicy::from_config(&config.retry);
    let mut summary = DetectionSummary::default();

    let stored_books = {
        let storage = storage.lock().unwrap();
        storage.list_books()?
    };
    tracing::info!("Checking {} stored books for changes", stored_books.len());

    for stored in &stored_books {
        summary.checked += 1;

        let fetched = match fetch_with_retry(&client, &stored.url, &policy).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("Skipping {} this cycle: {}", stored.url, e);
                summary.skipped += 1;
                continue;
            }
        };

        let parsed = parse_book_page(&fetched.body, &stored.url, &config.site.base_url);
        let mut fresh = match parsed.book {
            Some(book) => book,
            None => {
                tracing::warn!(
                    "Skipping {} this cycle: {}",
                    stored.url,
                    parsed.error.unwrap_or_default()
                );
                summary.skipped += 1;
                continue;
            }
        };

        // The breadcrumb category is not a tracked field; keep the stored
        // one so the replace does not churn it
        fresh.category = stored.category.clone();
        fresh.refresh_content_hash();

        if fresh.content_hash == stored.content_hash {
            summary.unchanged += 1;
            continue;
        }

        let changes = compare_books(stored, &fresh);
        if changes.is_empty() {
            // Hash moved but no tracked field we compare did (e.g. title
            // edits); nothing to log, but refresh the stored row
            replace_stored(storage, &fresh)?;
            summary.unchanged += 1;
            continue;
        }

        for change in &changes {
            match change.change_type {
                ChangeType::PriceChange => summary.price_changes += 1,
                ChangeType::AvailabilityChange => summary.availability_changes += 1,
                ChangeType::RatingChange => summary.rating_changes += 1,
                ChangeType::ReviewsChange => summary.reviews_changes += 1,
                ChangeType::NewBook => summary.new_books += 1,
            }
            summary.total_changes += 1;

            let mut storage = storage.lock().unwrap();
            storage.append_change(change)?;
        }

        replace_stored(storage, &fresh)?;
    }

    tracing::info!(
        "Detection cycle done: {} checked, {} unchanged, {} skipped, {} changes",
        summary.checked,
        summary.unchanged,
        summary.skipped,
        summary.total_changes
    );

    Ok(summary)
}

/// Compares tracked fields in fixed order, one record per difference
fn compare_books(old: &Book, new: &Book) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    if old.price_incl_tax != new.price_incl_tax {
        tracing::info!(
            "Price change for {}: £{:.2} -> £{:.2}",
            old.url,
            old.price_incl_tax,
            new.price_incl_tax
        );
        changes.push(ChangeRecord::field_change(
            &old.url,
            ChangeType::PriceChange,
            serde_json::json!(old.price_incl_tax),
            serde_json::json!(new.price_incl_tax),
        ));
    }

    if old.availability != new.availability {
        tracing::info!(
            "Availability change for {}: {} -> {}",
            old.url,
            old.availability,
            new.availability
        );
        changes.push(ChangeRecord::field_change(
            &old.url,
            ChangeType::AvailabilityChange,
            serde_json::json!(old.availability),
            serde_json::json!(new.availability),
        ));
    }

    if old.rating != new.rating {
        tracing::info!(
            "Rating change for {}: {} -> {} stars",
            old.url,
            old.rating,
            new.rating
        );
        changes.push(ChangeRecord::field_change(
            &old.url,
            ChangeType::RatingChange,
            serde_json::json!(old.rating),
            serde_json::json!(new.rating),
        ));
    }

    if old.num_reviews != new.num_reviews {
        tracing::info!(
            "Review count change for {}: {} -> {}",
            old.url,
            old.num_reviews,
            new.num_reviews
        );
        changes.push(ChangeRecord::field_change(
            &old.url,
            ChangeType::ReviewsChange,
            serde_json::json!(old.num_reviews),
            serde_json::json!(new.num_reviews),
        ));
    }

    changes
}

fn replace_stored(storage: &Arc<Mutex<SqliteStorage>>, book: &Book) -> Result<(), ShelfError> {
    let mut storage = storage.lock().unwrap();
    storage.replace_book(book)?;
    Ok(())
}
