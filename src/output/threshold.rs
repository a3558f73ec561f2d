//! Threshold gates over a finished report.

use super::schema::{PerformanceReport, ThresholdViolation};
use crate::utils::config::Thresholds;
use log::debug;

/// Check a report against configured thresholds
///
/// **Public** - the pass/fail gate used by `analyze`
///
/// # Arguments
/// * `report` - Report to check
/// * `thresholds` - Limits; unset limits are not checked
///
/// # Returns
/// Every violated limit. An unmeasurable average FPS (no qualifying frames)
/// fails a configured `min_avg_fps`.
///
/// # Example
/// ```ignore
/// let violations = check_thresholds(&report, &config.thresholds);
/// if !violations.is_empty() { std::process::exit(1); }
/// ```
pub fn check_thresholds(report: &PerformanceReport, thresholds: &Thresholds) -> Vec<ThresholdViolation> {
    let mut violations = Vec::new();

    if let Some(min_fps) = thresholds.min_avg_fps {
        let actual = report.frames.avg_fps;
        if actual.is_nan() || actual < min_fps {
            violations.push(violation("thresholds.min_avg_fps", min_fps, actual));
        }
    }

    if let Some(max_dropped) = thresholds.max_dropped_frames {
        if report.frames.dropped_frames > max_dropped {
            violations.push(violation(
                "thresholds.max_dropped_frames",
                max_dropped as f64,
                report.frames.dropped_frames as f64,
            ));
        }
    }

    if let Some(max_longest) = thresholds.max_longest_frame_ms {
        if report.frames.longest_frame_time > max_longest {
            violations.push(violation(
                "thresholds.max_longest_frame_ms",
                max_longest,
                report.frames.longest_frame_time,
            ));
        }
    }

    if let Some(max_cpu) = thresholds.max_cpu_percent {
        // NaN (empty window) never exceeds the limit
        if report.cpu.all_cpu_time_percent > max_cpu {
            violations.push(violation(
                "thresholds.max_cpu_percent",
                max_cpu,
                report.cpu.all_cpu_time_percent,
            ));
        }
    }

    if let Some(max_anomalies) = thresholds.max_anomalies {
        if report.anomaly_count > max_anomalies {
            violations.push(violation(
                "thresholds.max_anomalies",
                max_anomalies as f64,
                report.anomaly_count as f64,
            ));
        }
    }

    debug!("Threshold check found {} violations", violations.len());
    violations
}

fn violation(metric: &str, threshold: f64, actual: f64) -> ThresholdViolation {
    ThresholdViolation {
        metric: metric.to_string(),
        threshold,
        actual,
        severity: "error".to_string(),
    }
}
