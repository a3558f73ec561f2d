//! Validate command implementation.

use super::analyze::read_trace_file;
use crate::parser::storage::NullStorage;
use crate::parser::trace_events::{import_trace, TraceInput};
use anyhow::{Context, Result};
use std::path::Path;

/// Summary of a structurally valid trace
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSummary {
    pub shape: &'static str,
    pub threads: usize,
    pub events: usize,
    pub main_thread: Option<String>,
    pub anomalies: usize,
}

/// Check a trace file ingests without errors
///
/// **Public** - used by the `validate` subcommand
///
/// # Errors
/// Unreadable file, invalid JSON, or the first malformed record
pub fn validate_trace_file(path: &Path) -> Result<TraceSummary> {
    let raw = read_trace_file(path)?;

    let shape = match TraceInput::detect(&raw).context("Unrecognised trace shape")? {
        TraceInput::EventList(_) => "event list",
        TraceInput::Envelope(_) => "traceEvents envelope",
        TraceInput::CpuProfile(_) => "CPU profile",
    };

    let model = import_trace(&raw, Box::new(NullStorage)).context("Trace failed validation")?;

    Ok(TraceSummary {
        shape,
        threads: model.threads().count(),
        events: model.threads().map(|thread| thread.events().len()).sum(),
        main_thread: model.main_thread().map(|id| id.to_string()),
        anomalies: model.anomalies().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_valid_envelope() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"traceEvents": [
                {{"ph": "X", "name": "RunTask", "cat": "toplevel", "ts": 0, "dur": 10, "pid": 7, "tid": 3}},
                {{"ph": "E", "name": "Orphan", "ts": 20, "pid": 7, "tid": 3}}
            ]}}"#
        )
        .unwrap();

        let summary = validate_trace_file(file.path()).unwrap();
        assert_eq!(summary.shape, "traceEvents envelope");
        assert_eq!(summary.threads, 1);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.main_thread.as_deref(), Some("7:3"));
        assert_eq!(summary.anomalies, 1);
    }

    #[test]
    fn test_malformed_record_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"ph": "B", "name": "NoTs", "pid": 1, "tid": 1}}]"#).unwrap();
        assert!(validate_trace_file(file.path()).is_err());
    }
}
