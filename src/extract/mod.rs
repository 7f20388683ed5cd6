//! Markup extraction layer
//!
//! Pure HTML-to-entity parsing with no I/O:
//! - Book detail pages into validated [`crate::model::Book`] entities
//! - Listing pages into ordered book URLs and next-page links
//! - The site root into the category list

pub mod book_page;
pub mod fields;
pub mod listing;

pub use book_page::parse_book_page;
pub use fields::{build_absolute_url, clean_text, extract_number_from_text, extract_price, extract_rating};
pub use listing::{next_page_url, parse_category_index, parse_listing_page};
