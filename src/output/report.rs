//! Change report generation
//!
//! Renders the most recent change records as JSON or CSV. Reports are
//! snapshots of the append-only change log, most recent first.

use crate::model::ChangeRecord;
use crate::storage::{Storage, StorageResult};
use chrono::Utc;
use serde_json::json;

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
}

/// Loads the `limit` most recent changes and renders them
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `format` - Output format
/// * `limit` - Maximum number of records to include
pub fn generate_change_report(
    storage: &dyn Storage,
    format: ReportFormat,
    limit: u32,
) -> StorageResult<String> {
    let changes = storage.recent_changes(limit)?;
    Ok(match format {
        ReportFormat::Json => format_json_report(&changes),
        ReportFormat::Csv => format_csv_report(&changes),
    })
}

/// Formats change records as a pretty-printed JSON document
pub fn format_json_report(changes: &[ChangeRecord]) -> String {
    let entries: Vec<serde_json::Value> = changes
        .iter()
        .map(|change| {
            json!({
                "change_type": change.change_type.to_db_string(),
                "book_url": change.book_url,
                "old_value": change.old_value,
                "new_value": change.new_value,
                "changed_at": change.detected_at.to_rfc3339(),
            })
        })
        .collect();

    let report = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "total_changes": changes.len(),
        "changes": entries,
    });

    // json! never produces a map with non-string keys
    serde_json::to_string_pretty(&report).unwrap_or_default()
}

/// Formats change records as CSV with a fixed header row
pub fn format_csv_report(changes: &[ChangeRecord]) -> String {
    let mut csv = String::from("Change Type,Book URL,Old Value,New Value,Changed At\n");

    for change in changes {
        let row = [
            change.change_type.to_db_string().to_string(),
            change.book_url.clone(),
            value_cell(&change.old_value),
            value_cell(&change.new_value),
            change.detected_at.to_rfc3339(),
        ];
        let quoted: Vec<String> = row.iter().map(|field| csv_quote(field)).collect();
        csv.push_str(&quoted.join(","));
        csv.push('\n');
    }

    csv
}

/// Renders a JSON value for a CSV cell; null becomes the empty string
fn value_cell(value: &Option<serde_json::Value>) -> String {
    match value {
        None => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Quotes a CSV field when it contains a comma, quote or newline
fn csv_quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeType;

    fn sample_changes() -> Vec<ChangeRecord> {
        vec![
            ChangeRecord::field_change(
                "https://books.toscrape.com/catalogue/a_1/index.html",
                ChangeType::PriceChange,
                json!(10.99),
                json!(8.99),
            ),
            ChangeRecord::new_book(
                "https://books.toscrape.com/catalogue/b_2/index.html",
                "A Title, With Comma",
                "Poetry",
                12.5,
            ),
        ]
    }

    #[test]
    fn test_json_report_shape() {
        let report = format_json_report(&sample_changes());
        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();

        assert_eq!(parsed["total_changes"], 2);
        assert!(parsed["generated_at"].is_string());
        let changes = parsed["changes"].as_array().unwrap();
        assert_eq!(changes[0]["change_type"], "price_change");
        assert_eq!(changes[0]["old_value"], 10.99);
        assert_eq!(changes[1]["change_type"], "new_book");
        assert!(changes[1]["old_value"].is_null());
    }

    #[test]
    fn test_csv_report_header_and_rows() {
        let csv = format_csv_report(&sample_changes());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Change Type,Book URL,Old Value,New Value,Changed At");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("price_change,"));
    }

    #[test]
    fn test_csv_quotes_embedded_commas() {
        let csv = format_csv_report(&sample_changes());
        // The new-book summary value contains commas, so it must be quoted
        assert!(csv.contains("\"{\"\"category\"\":\"\"Poetry\"\""));
    }

    #[test]
    fn test_csv_empty_old_value_cell() {
        let csv = format_csv_report(&sample_changes());
        let new_book_row = csv.lines().nth(2).unwrap();
        assert!(new_book_row.starts_with("new_book,"));
        // Old value cell is empty for new-book events
        assert!(new_book_row.contains("index.html,,"));
    }

    #[test]
    fn test_csv_quote_plain_field_unchanged() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_empty_log_yields_header_only_csv() {
        let csv = format_csv_report(&[]);
        assert_eq!(csv, "Change Type,Book URL,Old Value,New Value,Changed At\n");
    }
}
