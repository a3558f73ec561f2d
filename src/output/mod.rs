//! Report output and threshold gates.
//!
//! This module handles:
//! - The serializable performance report
//! - Writing and reading reports as pretty JSON
//! - Checking reports against configured thresholds

pub mod json;
pub mod schema;
pub mod threshold;

// Re-export main functions
pub use json::{read_report, report_to_string, write_report};
pub use schema::{PerformanceReport, ThresholdViolation};
pub use threshold::check_thresholds;
