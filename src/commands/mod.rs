//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the library components and report through `anyhow`.

pub mod analyze;
pub mod validate;

// Re-export main command functions
pub use analyze::{execute_analyze, read_trace_file, validate_args, AnalyzeArgs, AnalyzeOutcome};
pub use validate::{validate_trace_file, TraceSummary};
