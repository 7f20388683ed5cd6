//! Book entity model with validation and content hashing
//!
//! A `Book` is one catalog item identified by its canonical URL. The
//! content hash digests the change-relevant fields so the detector can
//! short-circuit unchanged entities without a field-by-field comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised when a parsed book violates an entity invariant
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("category must not be empty")]
    EmptyCategory,

    #[error("price must be positive, got {0}")]
    NonPositivePrice(f64),

    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i64),
}

/// One catalog item with price, availability, rating and review count
///
/// Identity is the canonical `url`; the storage layer enforces its
/// uniqueness. `raw_html` keeps the fetched markup as a backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Canonical book page URL (unique identity)
    pub url: String,

    /// Book title
    pub title: String,

    /// Optional long-form description
    pub description: Option<String>,

    /// Category name (third breadcrumb segment, or the category being crawled)
    pub category: String,

    /// Price excluding tax, rounded to 2 decimals
    pub price_excl_tax: f64,

    /// Price including tax, rounded to 2 decimals
    pub price_incl_tax: f64,

    /// Availability as free text (e.g. "In stock (22 available)")
    pub availability: String,

    /// Number of reviews
    pub num_reviews: i64,

    /// Absolute cover image URL
    pub image_url: String,

    /// Star rating, 1-5
    pub rating: i64,

    /// When this snapshot was crawled
    pub crawl_timestamp: DateTime<Utc>,

    /// Entity status, "active" by default
    pub status: String,

    /// Hex SHA-256 digest over the change-relevant fields
    pub content_hash: String,

    /// Raw markup backup
    pub raw_html: Option<String>,
}

impl Book {
    /// Validates the entity invariants before persistence
    ///
    /// Rejected books are counted as failed by the caller and never
    /// stored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        if self.price_excl_tax <= 0.0 {
            return Err(ValidationError::NonPositivePrice(self.price_excl_tax));
        }
        if self.price_incl_tax <= 0.0 {
            return Err(ValidationError::NonPositivePrice(self.price_incl_tax));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(ValidationError::RatingOutOfRange(self.rating));
        }
        Ok(())
    }

    /// Computes the content hash over the tracked field set
    ///
    /// The digest input lists the fields in sorted key order with prices
    /// fixed to two decimals, so identical field values always produce an
    /// identical hash. Any change to price, availability, rating, review
    /// count or title changes the hash.
    pub fn compute_content_hash(&self) -> String {
        let input = format!(
            "availability={}|num_reviews={}|price_excl_tax={:.2}|price_incl_tax={:.2}|rating={}|title={}",
            self.availability,
            self.num_reviews,
            self.price_excl_tax,
            self.price_incl_tax,
            self.rating,
            self.title
        );
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Recomputes and stores the content hash
    ///
    /// Must be called after any mutation of a tracked field so the hash is
    /// never stale at persistence time.
    pub fn refresh_content_hash(&mut self) {
        self.content_hash = self.compute_content_hash();
    }
}

/// Result of parsing one book page
///
/// Transient only; never persisted.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Whether parsing produced a complete book
    pub success: bool,

    /// The parsed book, present when `success` is true
    pub book: Option<Book>,

    /// Error message naming every missing required field
    pub error: Option<String>,

    /// The URL that was parsed
    pub url: String,
}

impl ParseResult {
    /// Builds a successful result
    pub fn ok(book: Book, url: &str) -> Self {
        Self {
            success: true,
            book: Some(book),
            error: None,
            url: url.to_string(),
        }
    }

    /// Builds a failed result with an error message
    pub fn failed(error: impl Into<String>, url: &str) -> Self {
        Self {
            success: false,
            book: None,
            error: Some(error.into()),
            url: url.to_string(),
        }
    }
}
