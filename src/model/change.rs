//! Change events recorded by the detector
//!
//! A `ChangeRecord` is one field-level delta between two snapshots of the
//! same book (or the appearance of a new book). Records are append-only and
//! immutable once written.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Kind of delta a change record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    NewBook,
    PriceChange,
    AvailabilityChange,
    RatingChange,
    ReviewsChange,
}

impl ChangeType {
    /// Converts to the database string representation
    pub fn to_db_string(self) -> &'static str {
        match self {
            ChangeType::NewBook => "new_book",
            ChangeType::PriceChange => "price_change",
            ChangeType::AvailabilityChange => "availability_change",
            ChangeType::RatingChange => "rating_change",
            ChangeType::ReviewsChange => "reviews_change",
        }
    }

    /// Parses from the database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new_book" => Some(ChangeType::NewBook),
            "price_change" => Some(ChangeType::PriceChange),
            "availability_change" => Some(ChangeType::AvailabilityChange),
            "rating_change" => Some(ChangeType::RatingChange),
            "reviews_change" => Some(ChangeType::ReviewsChange),
            _ => None,
        }
    }
}

/// One recorded field-level delta between two book snapshots
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// URL of the book this change belongs to
    pub book_url: String,

    pub change_type: ChangeType,

    /// Previous value; null for new-book events
    pub old_value: Option<Value>,

    /// New value
    pub new_value: Option<Value>,

    pub detected_at: DateTime<Utc>,
}

impl ChangeRecord {
    /// Builds a change record for a single field delta
    pub fn field_change(
        book_url: &str,
        change_type: ChangeType,
        old_value: Value,
        new_value: Value,
    ) -> Self {
        Self {
            book_url: book_url.to_string(),
            change_type,
            old_value: Some(old_value),
            new_value: Some(new_value),
            detected_at: Utc::now(),
        }
    }

    /// Builds a new-book event with a summary of the entity
    pub fn new_book(book_url: &str, title: &str, category: &str, price: f64) -> Self {
        Self {
            book_url: book_url.to_string(),
            change_type: ChangeType::NewBook,
            old_value: None,
            new_value: Some(serde_json::json!({
                "title": title,
                "category": category,
                "price": price,
            })),
            detected_at: Utc::now(),
        }
    }
}
