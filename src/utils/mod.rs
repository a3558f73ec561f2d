//! Utility modules for configuration, error handling, and diagnostics.

pub mod anomaly;
pub mod config;
pub mod error;
pub mod nan;

// Re-export commonly used error types for convenience
pub use anomaly::AnomalyLog;
pub use error::{ConfigError, OutputError, ParseError, ReconstructionAnomaly};
