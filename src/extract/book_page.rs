//! Book detail page parser
//!
//! Pure markup-to-entity extraction for a single book page. No I/O happens
//! here; the caller supplies fetched HTML and the source URL.

use crate::extract::fields::{
    build_absolute_url, clean_text, extract_number_from_text, extract_price, extract_rating,
};
use crate::model::{Book, ParseResult};
use chrono::Utc;
use scraper::{Html, Selector};

/// Parses a book page into a [`ParseResult`]
///
/// Required fields are {title, category, price_incl_tax > 0, rating > 0}.
/// When any of them is missing the result carries `success = false` and an
/// error message naming every missing field; this function never panics on
/// malformed markup.
///
/// # Arguments
///
/// * `html` - HTML content of the book page
/// * `url` - URL the page was fetched from
/// * `base_url` - Site base for resolving relative image links
pub fn parse_book_page(html: &str, url: &str, base_url: &str) -> ParseResult {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let description = extract_description(&document);
    let category = extract_category(&document);
    let price_excl_tax = extract_table_price(&document, "Price (excl. tax)");
    let price_incl_tax = extract_price_incl_tax(&document);
    let availability = extract_availability(&document);
    let num_reviews = extract_num_reviews(&document);
    let image_url = extract_image_url(&document, base_url);
    let rating = extract_star_rating(&document);

    // Required-field validation; the message names every missing member.
    let mut missing = Vec::new();
    if title.is_empty() {
        missing.push("title");
    }
    if category.is_empty() {
        missing.push("category");
    }
    if price_incl_tax <= 0.0 {
        missing.push("price");
    }
    if rating <= 0 {
        missing.push("rating");
    }

    if !missing.is_empty() {
        let message = format!("Missing required fields: {}", missing.join(", "));
        tracing::warn!("Incomplete book data for {}: {}", url, message);
        return ParseResult::failed(message, url);
    }

    let mut book = Book {
        url: url.to_string(),
        title,
        description,
        category,
        price_excl_tax,
        price_incl_tax,
        availability,
        num_reviews,
        image_url,
        rating,
        crawl_timestamp: Utc::now(),
        status: "active".to_string(),
        content_hash: String::new(),
        raw_html: Some(html.to_string()),
    };
    book.refresh_content_hash();

    ParseResult::ok(book, url)
}

fn extract_title(document: &Html) -> String {
    let selector = Selector::parse("h1").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn extract_description(document: &Html) -> Option<String> {
    // The description paragraph follows the #product_description header.
    let selector = Selector::parse("#product_description ~ p").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_category(document: &Html) -> String {
    let selector = Selector::parse("ul.breadcrumb a").expect("static selector");
    let links: Vec<_> = document.select(&selector).collect();

    // Breadcrumb reads Home / Books / Category / Title; the category is the
    // third anchor.
    if links.len() >= 3 {
        clean_text(&links[2].text().collect::<String>())
    } else {
        "Unknown".to_string()
    }
}

/// Looks up a value in the product information table by its header text
fn extract_table_value(document: &Html, header: &str) -> Option<String> {
    let row_selector = Selector::parse("table.table-striped tr").expect("static selector");
    let th_selector = Selector::parse("th").expect("static selector");
    let td_selector = Selector::parse("td").expect("static selector");

    for row in document.select(&row_selector) {
        let th_text = row
            .select(&th_selector)
            .next()
            .map(|th| th.text().collect::<String>())
            .unwrap_or_default();

        if th_text.contains(header) {
            return row
                .select(&td_selector)
                .next()
                .map(|td| td.text().collect::<String>());
        }
    }

    None
}

fn extract_table_price(document: &Html, header: &str) -> f64 {
    extract_table_value(document, header)
        .map(|text| extract_price(&text))
        .unwrap_or(0.0)
}

fn extract_price_incl_tax(document: &Html) -> f64 {
    let from_table = extract_table_price(document, "Price (incl. tax)");
    if from_table > 0.0 {
        return from_table;
    }

    // Fallback: the main price element above the fold.
    let selector = Selector::parse("p.price_color").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| extract_price(&el.text().collect::<String>()))
        .unwrap_or(0.0)
}

fn extract_availability(document: &Html) -> String {
    if let Some(text) = extract_table_value(document, "Availability") {
        let cleaned = clean_text(&text);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }

    let selector = Selector::parse("p.instock.availability").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn extract_num_reviews(document: &Html) -> i64 {
    extract_table_value(document, "Number of reviews")
        .map(|text| extract_number_from_text(&text))
        .unwrap_or(0)
}

fn extract_image_url(document: &Html, base_url: &str) -> String {
    let gallery_selector = Selector::parse("#product_gallery img").expect("static selector");
    let fallback_selector = Selector::parse("div.item.active img").expect("static selector");

    let src = document
        .select(&gallery_selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .or_else(|| {
            document
                .select(&fallback_selector)
                .next()
                .and_then(|img| img.value().attr("src"))
        });

    src.map(|s| build_absolute_url(base_url, s)).unwrap_or_default()
}

fn extract_star_rating(document: &Html) -> i64 {
    let selector = Selector::parse("p.star-rating").expect("static selector");

    document
        .select(&selector)
        .next()
        .map(|el| {
            // The rating lives in the second class: "star-rating Three".
            el.value()
                .classes()
                .filter(|c| *c != "star-rating")
                .map(extract_rating)
                .find(|r| *r > 0)
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://books.toscrape.com";

    fn book_html(price_incl: &str, rating: &str) -> String {
        format!(
            r#"<html><body>
            <ul class="breadcrumb">
                <li><a href="/">Home</a></li>
                <li><a href="/books">Books</a></li>
                <li><a href="/poetry">Poetry</a></li>
                <li>A Light in the Attic</li>
            </ul>
            <div class="product_main">
                <h1>A Light in the Attic</h1>
                <p class="price_color">{price_incl}</p>
                <p class="star-rating {rating}"></p>
                <p class="instock availability">In stock (22 available)</p>
            </div>
            <div id="product_gallery"><img src="../../media/cache/fe/72/cover.jpg"/></div>
            <div id="product_description"><h2>Product Description</h2></div>
            <p>A timeless collection of poems.</p>
            <table class="table-striped">
                <tr><th>Price (excl. tax)</th><td>{price_incl}</td></tr>
                <tr><th>Price (incl. tax)</th><td>{price_incl}</td></tr>
                <tr><th>Availability</th><td>In stock (22 available)</td></tr>
                <tr><th>Number of reviews</th><td>0</td></tr>
            </table>
            </body></html>"#,
        )
    }

    #[test]
    fn test_parse_complete_book_page() {
        let html = book_html("£51.77", "Three");
        let url = format!("{}/catalogue/a-light-in-the-attic_1000/index.html", BASE);
        let result = parse_book_page(&html, &url, BASE);

        assert!(result.success, "error: {:?}", result.error);
        let book = result.book.unwrap();
        assert_eq!(book.title, "A Light in the Attic");
        assert_eq!(book.category, "Poetry");
        assert_eq!(book.price_incl_tax, 51.77);
        assert_eq!(book.price_excl_tax, 51.77);
        assert_eq!(book.availability, "In stock (22 available)");
        assert_eq!(book.num_reviews, 0);
        assert_eq!(book.rating, 3);
        assert_eq!(
            book.image_url,
            format!("{}/catalogue/media/cache/fe/72/cover.jpg", BASE)
        );
        assert_eq!(
            book.description.as_deref(),
            Some("A timeless collection of poems.")
        );
        assert!(book.validate().is_ok());
        assert_eq!(book.content_hash, book.compute_content_hash());
    }

    #[test]
    fn test_parse_missing_rating_fails_with_field_name() {
        let html = book_html("£51.77", "");
        let result = parse_book_page(&html, "https://example.com/book", BASE);

        assert!(!result.success);
        assert!(result.book.is_none());
        let error = result.error.unwrap();
        assert!(error.contains("rating"), "error was: {}", error);
        assert!(!error.contains("title"));
    }

    #[test]
    fn test_parse_empty_page_names_every_missing_field() {
        let result = parse_book_page("<html><body></body></html>", "https://x.example/b", BASE);

        assert!(!result.success);
        let error = result.error.unwrap();
        for field in ["title", "price", "rating"] {
            assert!(error.contains(field), "missing {} in: {}", field, error);
        }
    }

    #[test]
    fn test_parse_garbage_markup_does_not_panic() {
        let result = parse_book_page("<<<>>>not html at all<table><tr>", "https://x.example", BASE);
        assert!(!result.success);
    }

    #[test]
    fn test_price_incl_tax_falls_back_to_price_color() {
        let html = r#"<html><body>
            <ul class="breadcrumb">
                <li><a href="/">Home</a></li><li><a href="/b">Books</a></li>
                <li><a href="/p">Poetry</a></li>
            </ul>
            <h1>Fallback Book</h1>
            <p class="price_color">£12.50</p>
            <p class="star-rating Four"></p>
            </body></html>"#;
        let result = parse_book_page(html, "https://x.example/b", BASE);

        assert!(result.success, "error: {:?}", result.error);
        let book = result.book.unwrap();
        assert_eq!(book.price_incl_tax, 12.50);
        // No product table at all, so the excl-tax price stays at zero and
        // the entity fails validation before persistence.
        assert_eq!(book.price_excl_tax, 0.0);
        assert!(book.validate().is_err());
    }
}
