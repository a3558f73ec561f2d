//! Analyses over the per-thread event model.
//!
//! This module transforms ingested timelines into:
//! - Reconstructed JS call frames (from samples and invocation events)
//! - Rendering frames with CPU busy time
//! - Category time statistics, CPU and frame-rate metrics
//! - Layout shift clusters

pub mod categories;
pub mod frames;
pub mod layout_shift;
pub mod metrics;
pub mod stack_builder;

// Re-export main types and functions
pub use categories::{Category, CategoryTable};
pub use frames::{build_frames, FrameMarkers, RenderingFrame};
pub use layout_shift::{
    assign_layout_shifts_to_clusters, collect_layout_shifts, ClusterThresholds, LayoutShiftCluster,
};
pub use metrics::{
    aggregated_stats_for_trace_event, frame_stats, stats_for_time_range, AggregatedStats,
    CategorySeriesCache, CategoryTimes, CpuStats, FramesStats, SeriesKey, StatisticsEngine,
};
pub use stack_builder::{
    frames_to_trace_events, merge_frames, reconstruct_js_frames, Reconstruction, StackFilter,
    StackReconstructor,
};
