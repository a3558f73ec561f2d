//! Report schema written by the `analyze` command.

use crate::aggregator::layout_shift::LayoutShiftCluster;
use crate::aggregator::metrics::{CpuStats, FramesStats};
use crate::utils::anomaly::AnomalyLog;
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::nan;
use serde::{Deserialize, Serialize};

/// Top-level summary of one analysed trace
///
/// **Public** - serialized to JSON and checked against thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Report schema version
    pub version: String,

    /// RFC 3339 timestamp of when the report was produced
    pub generated_at: String,

    /// `pid:tid` of the analysed main thread, if one was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_thread: Option<String>,

    pub cpu: CpuStats,
    pub frames: FramesStats,

    /// Rendering frames kept after the skip-first-frame policy
    pub frame_count: usize,

    pub layout_shifts: Vec<LayoutShiftCluster>,

    /// Largest layout shift cluster score
    pub cumulative_layout_shift: f64,

    pub anomaly_count: usize,

    /// Human-readable anomaly descriptions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<String>,
}

impl PerformanceReport {
    pub fn new(
        main_thread: Option<String>,
        cpu: CpuStats,
        frames: FramesStats,
        frame_count: usize,
        layout_shifts: Vec<LayoutShiftCluster>,
        cumulative_layout_shift: f64,
        anomalies: &AnomalyLog,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            main_thread,
            cpu,
            frames,
            frame_count,
            layout_shifts,
            cumulative_layout_shift,
            anomaly_count: anomalies.len(),
            anomalies: anomalies.entries().iter().map(ToString::to_string).collect(),
        }
    }
}

/// One failed threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdViolation {
    /// Threshold key, e.g. `thresholds.min_avg_fps`
    pub metric: String,
    pub threshold: f64,

    /// NaN when the metric could not be measured
    #[serde(deserialize_with = "nan::deserialize")]
    pub actual: f64,

    /// "error" or "warning"
    pub severity: String,
}
