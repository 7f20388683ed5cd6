//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog and change-log statistics from the storage layer.

use crate::model::ChangeType;
use crate::storage::{Storage, StorageResult};
use std::collections::HashMap;

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Total number of books stored
    pub total_books: u64,

    /// Count of books by category
    pub books_by_category: HashMap<String, u64>,

    /// Total number of recorded changes
    pub total_changes: u64,

    /// Count of changes by change type
    pub changes_by_type: HashMap<ChangeType, u64>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CatalogStatistics> {
    Ok(CatalogStatistics {
        total_books: storage.count_books()?,
        books_by_category: storage.count_books_by_category()?,
        total_changes: storage.count_changes()?,
        changes_by_type: storage.count_changes_by_type()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Total books: {}", stats.total_books);
    println!("  Total changes recorded: {}", stats.total_changes);
    println!();

    if !stats.books_by_category.is_empty() {
        println!("Books by Category:");
        // Sort categories by count (descending), then by name
        let mut category_counts: Vec<_> = stats.books_by_category.iter().collect();
        category_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (category, count) in category_counts {
            let percentage = if stats.total_books > 0 {
                (*count as f64 / stats.total_books as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", category, count, percentage);
        }
        println!();
    }

    if !stats.changes_by_type.is_empty() {
        println!("Changes by Type:");
        let mut type_counts: Vec<_> = stats.changes_by_type.iter().collect();
        type_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (change_type, count) in type_counts {
            println!("  {}: {}", change_type.to_db_string(), count);
        }
        println!();
    }
}
