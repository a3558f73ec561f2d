//! Pageperf Trace
//!
//! Turns a browser performance trace (Chrome trace-event JSON or a
//! `.cpuprofile` sample profile) into CPU time breakdowns, rendering frame
//! metrics and layout shift clusters.
//!
//! This crate provides the core implementation for the `pageperf` CLI.
//!
//! ## Getting Started
//!
//! ```ignore
//! use pageperf_trace::{AnalysisConfig, TraceAnalysis};
//!
//! let trace: serde_json::Value = serde_json::from_str(&text)?;
//! let mut analysis = TraceAnalysis::from_json(&trace, &AnalysisConfig::default())?;
//! println!("{:?}", analysis.frame_stats());
//! ```

pub mod aggregator;
pub mod analysis;
pub mod commands;
pub mod model;
pub mod output;
pub mod parser;
pub mod utils;

pub use analysis::TraceAnalysis;
pub use output::PerformanceReport;
pub use utils::config::AnalysisConfig;
