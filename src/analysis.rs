//! End-to-end analysis of one trace.
//!
//! raw JSON → event model → JS frame reconstruction (every thread) →
//! main-thread timeline → rendering frames, category statistics and layout
//! shift clusters.

use crate::aggregator::categories::CategoryTable;
use crate::aggregator::frames::{build_frames, FrameMarkers, RenderingFrame};
use crate::aggregator::layout_shift::{
    assign_layout_shifts_to_clusters, collect_layout_shifts, ClusterThresholds, LayoutShiftCluster,
};
use crate::aggregator::metrics::{
    frame_stats, AggregatedStats, CategoryTimes, CpuStats, FramesStats, SeriesKey, StatisticsEngine,
};
use crate::aggregator::stack_builder::{merge_frames, reconstruct_js_frames, StackFilter};
use crate::model::event::{ThreadId, TraceEvent};
use crate::model::tracing_model::{nominal_start_time, TracingModel};
use crate::output::schema::PerformanceReport;
use crate::parser::storage::NullStorage;
use crate::parser::trace_events::import_trace;
use crate::utils::anomaly::AnomalyLog;
use crate::utils::config::AnalysisConfig;
use crate::utils::error::ParseError;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything derived from one trace
///
/// **Public** - the value a test harness holds on to
pub struct TraceAnalysis {
    config: AnalysisConfig,
    model: TracingModel,
    main_thread: Option<ThreadId>,

    /// Main-thread events merged with their reconstructed JS frames
    timeline: Vec<TraceEvent>,
    series_key: SeriesKey,

    js_frames: BTreeMap<ThreadId, Vec<TraceEvent>>,
    frames: Vec<RenderingFrame>,
    layout_shifts: Vec<TraceEvent>,
    clusters: Vec<LayoutShiftCluster>,
    anomalies: AnomalyLog,
    engine: StatisticsEngine,
}

impl TraceAnalysis {
    /// Analyse a parsed JSON trace with a fresh category table
    ///
    /// # Errors
    /// * `ParseError` - Input shape or records are malformed
    ///
    /// # Example
    /// ```ignore
    /// let mut analysis = TraceAnalysis::from_json(&trace, &AnalysisConfig::default())?;
    /// let cpu = analysis.cpu_stats();
    /// ```
    pub fn from_json(raw: &Value, config: &AnalysisConfig) -> Result<Self, ParseError> {
        Self::from_json_with_table(raw, config, Arc::new(CategoryTable::new()))
    }

    /// Analyse a parsed JSON trace sharing an existing category table
    pub fn from_json_with_table(
        raw: &Value,
        config: &AnalysisConfig,
        table: Arc<CategoryTable>,
    ) -> Result<Self, ParseError> {
        let model = import_trace(raw, Box::new(NullStorage))?;
        Ok(Self::from_model(model, config, table))
    }

    /// Run every analysis over an ingested model
    pub fn from_model(mut model: TracingModel, config: &AnalysisConfig, table: Arc<CategoryTable>) -> Self {
        let mut anomalies = model.take_anomalies();
        let filter = StackFilter::from_config(config);

        let mut next_ordinal = model.next_ordinal();
        let mut js_frames = BTreeMap::new();
        for thread in model.threads() {
            let reconstruction = reconstruct_js_frames(thread.events(), filter, next_ordinal);
            next_ordinal = reconstruction.next_ordinal;
            anomalies.extend(reconstruction.anomalies);
            if !reconstruction.frames.is_empty() {
                js_frames.insert(thread.id(), reconstruction.frames);
            }
        }

        let main_thread = model.main_thread();
        let mut timeline = main_thread
            .and_then(|id| model.thread(id))
            .map(|thread| thread.events().to_vec())
            .unwrap_or_default();
        if let Some(frames) = main_thread.and_then(|id| js_frames.get(&id)) {
            merge_frames(&mut timeline, frames);
        }

        let mut frames = build_frames(
            &timeline,
            &FrameMarkers::from_config(config),
            nominal_start_time(&timeline),
        );
        if config.skip_first_frame && !frames.is_empty() {
            frames.remove(0);
        }

        let mut layout_shifts: Vec<TraceEvent> = model
            .threads()
            .flat_map(|thread| collect_layout_shifts(thread.events()))
            .collect();
        let clusters =
            assign_layout_shifts_to_clusters(&mut layout_shifts, ClusterThresholds::from_config(config));

        info!(
            "Analysed trace: {} timeline events, {} frames, {} layout shift clusters, {} anomalies",
            timeline.len(),
            frames.len(),
            clusters.len(),
            anomalies.len()
        );

        Self {
            config: config.clone(),
            series_key: SeriesKey::for_events(&timeline),
            model,
            main_thread,
            timeline,
            js_frames,
            frames,
            layout_shifts,
            clusters,
            anomalies,
            engine: StatisticsEngine::new(table),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn model(&self) -> &TracingModel {
        &self.model
    }

    pub fn main_thread(&self) -> Option<ThreadId> {
        self.main_thread
    }

    /// Main-thread timeline including reconstructed JS frames
    pub fn timeline(&self) -> &[TraceEvent] {
        &self.timeline
    }

    /// Reconstructed JS frames of one thread
    pub fn js_frames(&self, thread: ThreadId) -> &[TraceEvent] {
        self.js_frames.get(&thread).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rendering frames after the skip-first-frame policy
    pub fn frames(&self) -> &[RenderingFrame] {
        &self.frames
    }

    pub fn layout_shifts(&self) -> &[TraceEvent] {
        &self.layout_shifts
    }

    pub fn layout_shift_clusters(&self) -> &[LayoutShiftCluster] {
        &self.clusters
    }

    /// Largest cluster score, 0 without clusters
    pub fn cumulative_layout_shift(&self) -> f64 {
        self.clusters.iter().map(|c| c.score).fold(0.0, f64::max)
    }

    pub fn anomalies(&self) -> &AnomalyLog {
        &self.anomalies
    }

    /// Window used for CPU stats: first kept frame start to last kept frame end
    pub fn cpu_window(&self) -> (f64, f64) {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => (first.start_time, last.end_time()),
            _ => (0.0, 0.0),
        }
    }

    /// CPU breakdown over the frame window
    pub fn cpu_stats(&mut self) -> CpuStats {
        let (start, end) = self.cpu_window();
        self.cpu_stats_for_range(start, end)
    }

    pub fn cpu_stats_for_range(&mut self, start: f64, end: f64) -> CpuStats {
        debug!("CPU stats for [{}, {})", start, end);
        self.engine.cpu_stats(self.series_key, &self.timeline, start, end)
    }

    /// Main-thread time per category within `[start, end)`
    pub fn stats_for_time_range(&mut self, start: f64, end: f64) -> CategoryTimes {
        self.engine
            .stats_for_time_range(self.series_key, &self.timeline, start, end)
    }

    /// Breakdown of one main-thread event and its descendants
    pub fn aggregated_stats(&self, event: &TraceEvent) -> AggregatedStats {
        self.engine.aggregated_stats_for_trace_event(event, &self.timeline)
    }

    pub fn frame_stats(&self) -> FramesStats {
        frame_stats(&self.frames, self.config.min_frame_activity)
    }

    /// Summary value for output and threshold checks
    pub fn report(&mut self) -> PerformanceReport {
        let cpu = self.cpu_stats();
        PerformanceReport::new(
            self.main_thread.map(|id| id.to_string()),
            cpu,
            self.frame_stats(),
            self.frames.len(),
            self.clusters.clone(),
            self.cumulative_layout_shift(),
            &self.anomalies,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trace() -> Value {
        json!([
            {"ph": "M", "name": "thread_name", "pid": 1, "tid": 1, "args": {"name": "CrRendererMain"}},
            {"ph": "X", "name": "RunTask", "cat": "toplevel", "ts": 0, "dur": 50000, "pid": 1, "tid": 1},
            {"ph": "I", "name": "BeginMainThreadFrame", "ts": 0, "pid": 1, "tid": 1},
            {"ph": "X", "name": "FunctionCall", "ts": 1000, "dur": 8000, "pid": 1, "tid": 1},
            {"ph": "I", "name": "Commit", "ts": 12000, "pid": 1, "tid": 1},
            {"ph": "I", "name": "BeginMainThreadFrame", "ts": 20000, "pid": 1, "tid": 1},
            {"ph": "X", "name": "Layout", "ts": 21000, "dur": 9000, "pid": 1, "tid": 1},
            {"ph": "I", "name": "DrawFrame", "ts": 31000, "pid": 1, "tid": 1},
            {"ph": "I", "name": "BeginMainThreadFrame", "ts": 40000, "pid": 1, "tid": 1}
        ])
    }

    #[test]
    fn test_skip_first_frame_policy() {
        let analysis = TraceAnalysis::from_json(&trace(), &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.frames().len(), 2);
        assert_eq!(analysis.frames()[0].start_time, 20.0);

        let config = AnalysisConfig {
            skip_first_frame: false,
            ..Default::default()
        };
        let analysis = TraceAnalysis::from_json(&trace(), &config).unwrap();
        assert_eq!(analysis.frames().len(), 3);
        assert_eq!(analysis.main_thread(), Some(ThreadId::new(1, 1)));
    }

    #[test]
    fn test_cpu_window_follows_kept_frames() {
        let mut analysis = TraceAnalysis::from_json(&trace(), &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.cpu_window(), (20.0, 50.0));

        let cpu = analysis.cpu_stats();
        assert_eq!(cpu.total_time, 30.0);
        assert_eq!(cpu.render_time, 9.0);
        assert_eq!(cpu.system_time, 21.0);
        assert_eq!(cpu.idle_time, 0.0);
    }

    #[test]
    fn test_malformed_trace_is_fatal() {
        let raw = json!([{"ph": "X", "name": "NoTimestamp"}]);
        assert!(matches!(
            TraceAnalysis::from_json(&raw, &AnalysisConfig::default()),
            Err(ParseError::MalformedTrace { index: 0, .. })
        ));
    }
}
