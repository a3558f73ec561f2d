//! Configuration and constants for trace analysis.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Thread name Chrome gives the renderer main thread
pub const MAIN_THREAD_NAME: &str = "CrRendererMain";

// Layout shifts closer than the gap and within the span share one cluster
pub const DEFAULT_LAYOUT_SHIFT_GAP_MS: f64 = 1000.0;
pub const DEFAULT_LAYOUT_SHIFT_SPAN_MS: f64 = 5000.0;

/// Non-dropped frames busier than this fraction count towards FPS
pub const DEFAULT_MIN_FRAME_ACTIVITY: f64 = 0.2;

/// Events that open a new rendering frame
pub const FRAME_BOUNDARY_MARKERS: &[&str] = &["BeginMainThreadFrame", "BeginFrame"];

/// Events proving a frame was drawn or committed
pub const FRAME_DRAW_SIGNALS: &[&str] = &["DrawFrame", "Commit", "CompositeLayers", "ActivateLayerTree"];

/// Events that explicitly mark the current frame as dropped
pub const DROPPED_FRAME_MARKERS: &[&str] = &["DroppedFrame"];

// Well-known record names
pub const RUN_TASK: &str = "RunTask";
pub const PROGRAM: &str = "Program";
pub const FUNCTION_CALL: &str = "FunctionCall";
pub const JS_SAMPLE: &str = "JSSample";
pub const JS_FRAME: &str = "JSFrame";
pub const CPU_PROFILE: &str = "CpuProfile";
pub const PROFILE: &str = "Profile";
pub const PROFILE_CHUNK: &str = "ProfileChunk";
pub const LAYOUT_SHIFT: &str = "LayoutShift";
pub const THREAD_NAME: &str = "thread_name";
pub const PROCESS_NAME: &str = "process_name";

/// Events that run JavaScript; samples under them extend the JS stack
pub const JS_INVOCATION_EVENTS: &[&str] = &[
    "FunctionCall",
    "EvaluateScript",
    "v8.evaluateModule",
    "EventDispatch",
    "RunMicrotasks",
    "V8.Execute",
];

pub const TOP_LEVEL_CATEGORY: &str = "toplevel";
pub const DEVTOOLS_TIMELINE_CATEGORY: &str = "disabled-by-default-devtools.timeline";
pub const LEGACY_TIMELINE_CATEGORY: &str = "devtools.timeline";

/// Frame url V8 uses for runtime-call-stats pseudo frames
pub const NATIVE_RUNTIME_URL: &str = "native V8Runtime";

/// Profile args bigger than this are moved to backing storage
pub const LARGE_PAYLOAD_BYTES: usize = 64 * 1024;

/// Knobs for one analysis run
///
/// **Public** - loaded from TOML by the CLI, or built in code by a harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Discard the first rendering frame (profiler warm-up)
    pub skip_first_frame: bool,

    /// Keep every stack frame, skipping native/runtime filtering
    pub show_all_events: bool,

    /// Keep frames whose URL starts with "native "
    pub show_native_functions: bool,

    /// Keep V8 runtime Parse/Compile frames (collapsed per group)
    pub show_runtime_call_stats: bool,

    pub layout_shift_gap_ms: f64,
    pub layout_shift_span_ms: f64,

    /// Minimum CPU-busy fraction for a non-dropped frame to count
    pub min_frame_activity: f64,

    pub frame_boundary_markers: Vec<String>,
    pub frame_draw_signals: Vec<String>,
    pub dropped_frame_markers: Vec<String>,

    /// Assertion gates checked by the CLI
    pub thresholds: Thresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            skip_first_frame: true,
            show_all_events: false,
            show_native_functions: false,
            show_runtime_call_stats: false,
            layout_shift_gap_ms: DEFAULT_LAYOUT_SHIFT_GAP_MS,
            layout_shift_span_ms: DEFAULT_LAYOUT_SHIFT_SPAN_MS,
            min_frame_activity: DEFAULT_MIN_FRAME_ACTIVITY,
            frame_boundary_markers: to_owned_names(FRAME_BOUNDARY_MARKERS),
            frame_draw_signals: to_owned_names(FRAME_DRAW_SIGNALS),
            dropped_frame_markers: to_owned_names(DROPPED_FRAME_MARKERS),
            thresholds: Thresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout_shift_gap_ms <= 0.0 || self.layout_shift_span_ms <= 0.0 {
            return Err(ConfigError::Invalid(
                "layout shift gap and span must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_frame_activity) {
            return Err(ConfigError::Invalid(format!(
                "min_frame_activity must be within [0, 1], got {}",
                self.min_frame_activity
            )));
        }

        if self.frame_boundary_markers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one frame boundary marker is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Pass/fail gates a test harness can assert on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_avg_fps: Option<f64>,
    pub max_dropped_frames: Option<u64>,
    pub max_longest_frame_ms: Option<f64>,

    /// Upper bound on `allCPUTimePercent`, in [0, 1]
    pub max_cpu_percent: Option<f64>,

    /// Usually 0: any reconstruction anomaly fails the run
    pub max_anomalies: Option<usize>,
}

/// Load analysis configuration from a TOML file
///
/// # Errors
/// * `ConfigError::Io` - If file cannot be read
/// * `ConfigError::Toml` - If TOML is invalid
/// * `ConfigError::Invalid` - If values are out of range
///
/// # Example
/// ```ignore
/// let config = load_config("pageperf.toml")?;
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

fn to_owned_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.skip_first_frame);
        assert_eq!(config.layout_shift_gap_ms, 1000.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            skip_first_frame = false
            layout_shift_gap_ms = 500.0

            [thresholds]
            min_avg_fps = 55.0
            max_anomalies = 0
            "#,
        )
        .unwrap();

        assert!(!config.skip_first_frame);
        assert_eq!(config.layout_shift_gap_ms, 500.0);
        assert_eq!(config.layout_shift_span_ms, DEFAULT_LAYOUT_SHIFT_SPAN_MS);
        assert_eq!(config.thresholds.min_avg_fps, Some(55.0));
        assert_eq!(config.thresholds.max_anomalies, Some(0));
        assert_eq!(config.thresholds.max_dropped_frames, None);
    }

    #[test]
    fn test_invalid_activity_rejected() {
        let config = AnalysisConfig {
            min_frame_activity: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pageperf.toml");
        fs::write(&path, "show_native_functions = true\n").unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.show_native_functions);
    }
}
