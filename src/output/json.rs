//! JSON report writer.
//!
//! Writes PerformanceReport values to JSON files with pretty formatting.

use super::schema::PerformanceReport;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Write a report to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `report` - Report to write
/// * `output_path` - Path to output JSON file; missing parent directories are created
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
///
/// # Example
/// ```ignore
/// let report = analysis.report();
/// write_report(&report, "report.json")?;
/// ```
pub fn write_report(report: &PerformanceReport, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing report to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!("Cannot create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report).map_err(OutputError::SerializationFailed)?;

    info!(
        "Report written successfully ({} bytes)",
        calculate_file_size(output_path)
    );

    Ok(())
}

/// Serialize a report to a pretty JSON string
pub fn report_to_string(report: &PerformanceReport) -> Result<String, OutputError> {
    serde_json::to_string_pretty(report).map_err(OutputError::SerializationFailed)
}

/// Validate that output path is writable
///
/// **Private** - internal validation
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Calculate file size in bytes
///
/// **Private** - internal utility
fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a report back from a JSON file
///
/// **Public** - used by tests and by harnesses comparing runs
///
/// # Errors
/// * `OutputError::ReadFailed` - File open or read error
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report(input_path: impl AsRef<Path>) -> Result<PerformanceReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading report from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::ReadFailed)?;
    let report: PerformanceReport =
        serde_json::from_reader(BufReader::new(file)).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Report loaded: version {}, {} frames",
        report.version, report.frame_count
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::metrics::{CpuStats, FramesStats};
    use crate::utils::anomaly::AnomalyLog;
    use crate::utils::error::ReconstructionAnomaly;
    use tempfile::NamedTempFile;

    fn create_test_report() -> PerformanceReport {
        let mut anomalies = AnomalyLog::new();
        anomalies.report(ReconstructionAnomaly::UnclosedBegin {
            name: "Layout".to_string(),
            time: 4.0,
        });

        let cpu = CpuStats::from_category_times(&Default::default(), 0.0, 0.0);
        let frames = FramesStats {
            avg_fps: f64::NAN,
            dropped_frames: 0,
            longest_frame_time: 0.0,
        };
        PerformanceReport::new(Some("1:1".to_string()), cpu, frames, 0, vec![], 0.0, &anomalies)
    }

    #[test]
    fn test_write_and_read_report() {
        let report = create_test_report();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        write_report(&report, path).unwrap();
        let loaded = read_report(path).unwrap();

        assert_eq!(loaded.version, report.version);
        assert_eq!(loaded.main_thread.as_deref(), Some("1:1"));
        assert_eq!(loaded.anomaly_count, 1);
        assert_eq!(loaded.anomalies, report.anomalies);
    }

    #[test]
    fn test_nan_metrics_survive_as_null() {
        let report = create_test_report();
        let text = report_to_string(&report).unwrap();
        assert!(text.contains("\"avgFPS\": null"));

        let loaded: PerformanceReport = serde_json::from_str(&text).unwrap();
        assert!(loaded.frames.avg_fps.is_nan());
        assert!(loaded.cpu.idle_time_percent.is_nan());
    }

    #[test]
    fn test_validate_output_path_empty() {
        assert!(validate_output_path(Path::new("")).is_err());
    }

    #[test]
    fn test_validate_output_path_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(validate_output_path(temp_dir.path()).is_err());
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/report.json");

        write_report(&create_test_report(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_read_missing_report_is_read_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("absent.json");

        let err = read_report(&missing).unwrap_err();

        assert!(matches!(err, OutputError::ReadFailed(_)));
        assert!(err.to_string().starts_with("Failed to read file"));
    }
}
