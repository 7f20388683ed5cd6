//! Field-level extraction helpers
//!
//! Small pure functions shared by the page parsers: price and rating
//! parsing, text cleanup, and site-specific absolute URL building.

/// Rounds a price to two decimal places
pub fn round_price(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Extracts a numeric price from a string like "£51.77"
///
/// Currency symbols, commas and whitespace are stripped before parsing.
/// An unparsable remainder yields 0.0 rather than an error; the caller's
/// required-field validation catches missing prices.
pub fn extract_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ',') && !c.is_whitespace())
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) => round_price(value),
        Err(_) => {
            if !raw.trim().is_empty() {
                tracing::warn!("Could not parse price: {}", raw);
            }
            0.0
        }
    }
}

/// Extracts a star rating from a CSS class like "star-rating Three"
///
/// Returns 0 when no ordinal word is present; 0 fails the required-field
/// validation downstream.
pub fn extract_rating(rating_class: &str) -> i64 {
    const RATING_WORDS: [(&str, i64); 5] = [
        ("One", 1),
        ("Two", 2),
        ("Three", 3),
        ("Four", 4),
        ("Five", 5),
    ];

    for (word, value) in RATING_WORDS {
        if rating_class.contains(word) {
            return value;
        }
    }

    0
}

/// Extracts the first integer token from a text field, else 0
pub fn extract_number_from_text(text: &str) -> i64 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().unwrap_or(0)
}

/// Collapses runs of whitespace and trims the result
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds an absolute URL from the site base and a relative path
///
/// `../` segments are stripped rather than resolved, and a `catalogue/`
/// prefix is inserted when the remainder lacks one; book and image links on
/// the target site are always relative to the catalogue directory.
pub fn build_absolute_url(base_url: &str, relative_url: &str) -> String {
    if relative_url.starts_with("http://") || relative_url.starts_with("https://") {
        return relative_url.to_string();
    }

    let base = base_url.trim_end_matches('/');
    let mut relative = relative_url.trim_start_matches('/').to_string();

    if relative.starts_with("../") {
        relative = relative.replace("../", "");
        if !relative.contains("catalogue") {
            relative = format!("catalogue/{}", relative);
        }
    }

    format!("{}/{}", base, relative)
}
