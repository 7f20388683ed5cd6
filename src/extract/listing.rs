//! Listing and index page parsers
//!
//! Pure extraction of book URLs from category pages, the next-page link
//! from pagination, and the category list from the site root.

use crate::extract::fields::{build_absolute_url, clean_text};
use scraper::{Html, Selector};

/// Extracts the ordered book URLs from a listing page
///
/// Books live in `article.product_pod` elements; each links to its detail
/// page from the `<h3>` anchor. URLs are absolutized against the site base.
pub fn parse_listing_page(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("article.product_pod h3 a[href]").expect("static selector");

    let urls: Vec<String> = document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .map(|href| build_absolute_url(base_url, href))
        .collect();

    tracing::debug!("Found {} books on page", urls.len());
    urls
}

/// Returns the relative URL of the next listing page, if any
pub fn next_page_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("li.next a[href]").expect("static selector");

    document
        .select(&selector)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(|href| href.to_string())
}

/// Extracts (name, url) pairs for every category on the site root
///
/// Categories are the sidebar `ul.nav-list` anchors; the first anchor is
/// the "Books" parent and is skipped.
pub fn parse_category_index(html: &str, base_url: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("ul.nav-list a[href]").expect("static selector");

    let categories: Vec<(String, String)> = document
        .select(&selector)
        .skip(1)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let name = clean_text(&link.text().collect::<String>());
            Some((name, build_absolute_url(base_url, href)))
        })
        .collect();

    tracing::debug!("Found {} categories", categories.len());
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://books.toscrape.com";

    #[test]
    fn test_parse_listing_page_ordered() {
        let html = r#"<html><body>
            <article class="product_pod">
                <h3><a href="../../../first_1/index.html">First</a></h3>
            </article>
            <article class="product_pod">
                <h3><a href="../../../second_2/index.html">Second</a></h3>
            </article>
            </body></html>"#;

        let urls = parse_listing_page(html, BASE);
        assert_eq!(
            urls,
            vec![
                format!("{}/catalogue/first_1/index.html", BASE),
                format!("{}/catalogue/second_2/index.html", BASE),
            ]
        );
    }

    #[test]
    fn test_parse_listing_page_empty() {
        let urls = parse_listing_page("<html><body><p>No books.</p></body></html>", BASE);
        assert!(urls.is_empty());
    }

    #[test]
    fn test_next_page_url_present() {
        let html = r#"<ul class="pager"><li class="next"><a href="page-2.html">next</a></li></ul>"#;
        assert_eq!(next_page_url(html), Some("page-2.html".to_string()));
    }

    #[test]
    fn test_next_page_url_absent() {
        let html = r#"<ul class="pager"><li class="previous"><a href="page-1.html">previous</a></li></ul>"#;
        assert_eq!(next_page_url(html), None);
    }

    #[test]
    fn test_parse_category_index_skips_parent() {
        let html = r#"<ul class="nav-list">
            <li><a href="catalogue/category/books_1/index.html">Books</a></li>
            <li><a href="catalogue/category/books/travel_2/index.html">  Travel </a></li>
            <li><a href="catalogue/category/books/mystery_3/index.html">Mystery</a></li>
            </ul>"#;

        let categories = parse_category_index(html, BASE);
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].0, "Travel");
        assert_eq!(
            categories[0].1,
            format!("{}/catalogue/category/books/travel_2/index.html", BASE)
        );
        assert_eq!(categories[1].0, "Mystery");
    }
}
