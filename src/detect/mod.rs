//! Change detection cycle over persisted books

pub mod detector;

pub use detector::{detect_changes, run_change_detection, DetectionSummary};
