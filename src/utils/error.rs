//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while ingesting a raw trace
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A record failed structural validation. `index` is the position of the
    /// first offending record in the event list.
    #[error("Malformed trace event at index {index}: {reason}")]
    MalformedTrace { index: usize, reason: String },

    #[error("Invalid trace format: {0}")]
    InvalidFormat(String),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to read file: {0}")]
    ReadFailed(std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors that can occur while loading analysis configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Non-fatal inconsistencies found while building the timeline.
///
/// These never fail the pipeline. They are logged and collected in an
/// [`AnomalyLog`](super::anomaly::AnomalyLog) so callers can gate on them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconstructionAnomaly {
    #[error("Child stack is shallower ({depth}) than the parent stack ({locked}) at {time}")]
    ShallowerThanLocked { depth: usize, locked: usize, time: f64 },

    #[error("Trying to truncate to depth {depth} beyond the current stack size {size} at {time}")]
    TruncateBeyondStack { depth: usize, size: usize, time: f64 },

    #[error("Sample {index} references unknown profile node {node_id}")]
    UnknownSampleNode { index: usize, node_id: u64 },

    #[error("End event '{name}' at {time} on {pid}:{tid} has no matching begin")]
    UnmatchedEnd {
        name: String,
        time: f64,
        pid: i64,
        tid: i64,
    },

    #[error("Event '{name}' (ph '{phase}') has no timestamp and was skipped")]
    MissingTimestamp { name: String, phase: String },

    #[error("Begin event '{name}' at {time} was never closed")]
    UnclosedBegin { name: String, time: f64 },
}
