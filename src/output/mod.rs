//! Report and statistics output

pub mod report;
pub mod stats;

pub use report::{format_csv_report, format_json_report, generate_change_report, ReportFormat};
pub use stats::{load_statistics, print_statistics, CatalogStatistics};
