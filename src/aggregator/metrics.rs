//! Category statistics and frame-rate metrics.
//!
//! Category time is answered from cumulative per-category series: one O(n)
//! walk records a breakpoint at every category transition, and any range
//! query is two binary searches plus linear interpolation per category.

use super::categories::{Category, CategoryTable};
use super::frames::RenderingFrame;
use crate::model::event::TraceEvent;
use crate::model::walk::{walk_events, TimelineVisitor};
use crate::utils::nan;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Time per category, in milliseconds
pub type CategoryTimes = BTreeMap<Category, f64>;

/// Cumulative time spent in one category, sampled at transitions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorySeries {
    time: Vec<f64>,
    value: Vec<f64>,
}

impl CategorySeries {
    /// Cumulative value at `time`, interpolated between breakpoints
    pub fn value_at(&self, time: f64) -> f64 {
        let index = self.time.partition_point(|t| *t <= time);
        if index == 0 {
            return 0.0;
        }
        if index == self.time.len() {
            return self.value[index - 1];
        }

        let (t0, t1) = (self.time[index - 1], self.time[index]);
        let (v0, v1) = (self.value[index - 1], self.value[index]);
        v0 + (v1 - v0) * (time - t0) / (t1 - t0)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Series for every category seen in one event sequence
#[derive(Debug, Clone, Default)]
pub struct CategorySeriesSet {
    series: BTreeMap<Category, CategorySeries>,
}

impl CategorySeriesSet {
    /// Build from a (start, ordinal)-sorted event sequence
    pub fn build(events: &[TraceEvent], table: &CategoryTable) -> Self {
        let mut builder = SeriesBuilder {
            table,
            stack: Vec::new(),
            last_time: 0.0,
            series: BTreeMap::new(),
        };
        walk_events(events, &mut builder, f64::NEG_INFINITY, f64::INFINITY);

        debug!(
            "Built category series for {} events ({} categories)",
            events.len(),
            builder.series.len()
        );

        Self {
            series: builder.series,
        }
    }

    pub fn get(&self, category: Category) -> Option<&CategorySeries> {
        self.series.get(&category)
    }

    /// Cumulative value of every category at `time`
    fn values_at(&self, time: f64) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.series
            .iter()
            .map(move |(category, series)| (*category, series.value_at(time)))
    }
}

struct SeriesBuilder<'a> {
    table: &'a CategoryTable,
    stack: Vec<Category>,
    last_time: f64,
    series: BTreeMap<Category, CategorySeries>,
}

impl SeriesBuilder<'_> {
    fn category_change(&mut self, from: Option<Category>, to: Option<Category>, time: f64) {
        if let Some(from) = from {
            self.update(from, time);
        }
        self.last_time = time;
        if let Some(to) = to {
            self.update(to, time);
        }
    }

    fn update(&mut self, category: Category, time: f64) {
        let series = self.series.entry(category).or_default();
        if series.time.last() == Some(&time) || self.last_time > time {
            return;
        }
        let last_value = series.value.last().copied().unwrap_or(0.0);
        series.value.push(last_value + time - self.last_time);
        series.time.push(time);
    }
}

impl TimelineVisitor for SeriesBuilder<'_> {
    fn on_start(&mut self, event: &TraceEvent) {
        let category = self.table.classify(event);
        let parent = self.stack.last().copied();
        if parent != Some(category) {
            self.category_change(parent, Some(category), event.start_time);
        }
        self.stack.push(category);
    }

    fn on_end(&mut self, event: &TraceEvent) {
        let category = self.stack.pop();
        let parent = self.stack.last().copied();
        if category != parent {
            self.category_change(category, parent, event.end_or_start());
        }
    }

    fn on_instant(&mut self, _event: &TraceEvent, _parent: Option<&TraceEvent>) {}
}

/// Identity of an event sequence in the series cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesKey(u64);

impl SeriesKey {
    /// Caller-chosen identifier, e.g. a thread index
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Fingerprint from the sequence's length and boundary events
    pub fn for_events(events: &[TraceEvent]) -> Self {
        let mut hasher = DefaultHasher::new();
        events.len().hash(&mut hasher);
        for event in events.first().into_iter().chain(events.last()) {
            event.start_time.to_bits().hash(&mut hasher);
            event.ordinal.hash(&mut hasher);
            event.thread.hash(&mut hasher);
        }
        Self(hasher.finish())
    }
}

/// Built series keyed by sequence identity
///
/// Scoped to one analysis; never shared between traces.
#[derive(Debug, Default)]
pub struct CategorySeriesCache {
    entries: HashMap<SeriesKey, CategorySeriesSet>,
}

impl CategorySeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Series for `key`, building it from `events` on first use
    pub fn get_or_build(
        &mut self,
        key: SeriesKey,
        events: &[TraceEvent],
        table: &CategoryTable,
    ) -> &CategorySeriesSet {
        self.entries
            .entry(key)
            .or_insert_with(|| CategorySeriesSet::build(events, table))
    }

    /// Drop the series for a sequence that changed
    pub fn invalidate(&mut self, key: SeriesKey) {
        self.entries.remove(&key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Time per category within `[start, end)`
///
/// **Public** - core range query
///
/// # Arguments
/// * `cache` - Series cache owned by the caller
/// * `table` - Category table
/// * `key` - Identity of `events` in the cache
/// * `events` - Sorted event sequence
/// * `start`, `end` - Range in milliseconds
///
/// # Returns
/// Non-zero category times plus an `Idle` entry holding the unaccounted
/// remainder (never negative). Values sum to `end - start` whenever the
/// categories do not overlap.
pub fn stats_for_time_range(
    cache: &mut CategorySeriesCache,
    table: &CategoryTable,
    key: SeriesKey,
    events: &[TraceEvent],
    start: f64,
    end: f64,
) -> CategoryTimes {
    let mut stats = CategoryTimes::new();
    if events.is_empty() {
        stats.insert(Category::Idle, end - start);
        return stats;
    }

    let series = cache.get_or_build(key, events, table);
    let at_start: BTreeMap<Category, f64> = series.values_at(start).collect();

    for (category, value) in series.values_at(end) {
        if category == Category::Idle {
            continue;
        }
        let delta = value - at_start.get(&category).copied().unwrap_or(0.0);
        if delta != 0.0 {
            stats.insert(category, delta);
        }
    }

    let total: f64 = stats.values().sum();
    stats.insert(Category::Idle, (end - start - total).max(0.0));
    stats
}

/// Per-category breakdown of one event and its descendants
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedStats {
    pub totals: CategoryTimes,

    /// Whether any descendant contributed time
    pub has_children: bool,
}

/// Sum self time of `event` and everything nested under it
///
/// **Public** - per-event breakdown
///
/// Only events on the same thread with non-zero self time starting inside
/// the event count. For async spans an `Idle` remainder is added and
/// `has_children` is always false.
pub fn aggregated_stats_for_trace_event(
    table: &CategoryTable,
    event: &TraceEvent,
    events: &[TraceEvent],
) -> AggregatedStats {
    let mut stats = AggregatedStats::default();
    let is_async = event.phase.is_async();

    let lower = events.partition_point(|e| e.start_time < event.start_time);
    let index = if is_async {
        lower
    } else {
        let exact = events[lower..]
            .iter()
            .take_while(|e| e.start_time == event.start_time)
            .position(|e| e.ordinal == event.ordinal);
        match exact {
            Some(offset) => lower + offset,
            None => return stats,
        }
    };

    if let Some(end_time) = event.end_time {
        for (i, next) in events.iter().enumerate().skip(index) {
            if next.start_time >= end_time {
                break;
            }
            if next.self_time == 0.0 || next.thread != event.thread {
                continue;
            }
            if i > index {
                stats.has_children = true;
            }
            *stats.totals.entry(table.classify(next)).or_insert(0.0) += next.self_time;
        }

        if is_async {
            let total: f64 = stats.totals.values().sum();
            stats
                .totals
                .insert(Category::Idle, (end_time - event.start_time - total).max(0.0));
        }
    }

    if is_async {
        stats.has_children = false;
    }
    stats
}

/// CPU time breakdown for a time window
///
/// Percentages are fractions of `totalTime` in [0, 1], NaN for an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub total_time: f64,
    #[serde(rename = "allCPUTime")]
    pub all_cpu_time: f64,
    pub script_time: f64,
    pub render_time: f64,
    pub system_time: f64,
    pub paint_time: f64,
    pub idle_time: f64,

    #[serde(rename = "allCPUTimePercent", deserialize_with = "nan::deserialize")]
    pub all_cpu_time_percent: f64,
    #[serde(deserialize_with = "nan::deserialize")]
    pub script_time_percent: f64,
    #[serde(deserialize_with = "nan::deserialize")]
    pub render_time_percent: f64,
    #[serde(deserialize_with = "nan::deserialize")]
    pub system_time_percent: f64,
    #[serde(deserialize_with = "nan::deserialize")]
    pub paint_time_percent: f64,
    #[serde(deserialize_with = "nan::deserialize")]
    pub idle_time_percent: f64,
}

impl CpuStats {
    /// Derive absolute and relative figures from a range breakdown
    pub fn from_category_times(stats: &CategoryTimes, start: f64, end: f64) -> Self {
        let get = |category| stats.get(&category).copied().unwrap_or(0.0);
        let total_time = end - start;
        let idle_time = get(Category::Idle);
        let all_cpu_time = total_time - idle_time;
        let (script_time, render_time, system_time, paint_time) = (
            get(Category::Scripting),
            get(Category::Rendering),
            get(Category::Other),
            get(Category::Painting),
        );

        Self {
            total_time,
            all_cpu_time,
            script_time,
            render_time,
            system_time,
            paint_time,
            idle_time,
            all_cpu_time_percent: all_cpu_time / total_time,
            script_time_percent: script_time / total_time,
            render_time_percent: render_time / total_time,
            system_time_percent: system_time / total_time,
            paint_time_percent: paint_time / total_time,
            idle_time_percent: idle_time / total_time,
        }
    }
}

/// Frame-rate summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramesStats {
    /// NaN when no frame qualifies
    #[serde(rename = "avgFPS", deserialize_with = "nan::deserialize")]
    pub avg_fps: f64,
    pub dropped_frames: u64,
    pub longest_frame_time: f64,
}

/// Frames that count for FPS
///
/// Non-zero duration, and either dropped or busy for at least
/// `min_activity` of the frame.
pub fn is_valid_fps_frame(frame: &RenderingFrame, min_activity: f64) -> bool {
    if frame.duration == 0.0 {
        return false;
    }
    frame.dropped || frame.cpu_time / frame.duration >= min_activity
}

/// Summarise frames into FPS, dropped count and longest stall
///
/// **Public** - frame metrics entry point
///
/// # Arguments
/// * `frames` - Rendering frames in time order
/// * `min_activity` - Busy fraction below which non-dropped frames are noise
///
/// # Returns
/// Average of `1000 / duration` over valid non-dropped frames, count of
/// valid dropped frames, and the longest non-dropped frame with any directly
/// following dropped frames folded into it.
pub fn frame_stats(frames: &[RenderingFrame], min_activity: f64) -> FramesStats {
    let valid: Vec<&RenderingFrame> = frames
        .iter()
        .filter(|frame| is_valid_fps_frame(frame, min_activity))
        .collect();

    let mut dropped_frames = 0;
    let mut longest_frame_time: f64 = 0.0;
    let mut fps_sum = 0.0;
    let mut fps_count = 0usize;

    for (index, frame) in valid.iter().enumerate() {
        if frame.dropped {
            dropped_frames += 1;
            continue;
        }

        let stalled: f64 = valid[index + 1..]
            .iter()
            .take_while(|next| next.dropped)
            .map(|next| next.duration)
            .sum();
        longest_frame_time = longest_frame_time.max(frame.duration + stalled);

        fps_sum += 1000.0 / frame.duration;
        fps_count += 1;
    }

    FramesStats {
        avg_fps: if fps_count == 0 {
            f64::NAN
        } else {
            fps_sum / fps_count as f64
        },
        dropped_frames,
        longest_frame_time,
    }
}

/// Statistics over one trace
///
/// **Public** - owns the series cache for that trace
#[derive(Debug)]
pub struct StatisticsEngine {
    table: Arc<CategoryTable>,
    cache: CategorySeriesCache,
}

impl StatisticsEngine {
    pub fn new(table: Arc<CategoryTable>) -> Self {
        Self {
            table,
            cache: CategorySeriesCache::new(),
        }
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    pub fn cache(&self) -> &CategorySeriesCache {
        &self.cache
    }

    /// Forget the cached series of a sequence that changed
    pub fn invalidate(&mut self, key: SeriesKey) {
        self.cache.invalidate(key);
    }

    pub fn stats_for_time_range(
        &mut self,
        key: SeriesKey,
        events: &[TraceEvent],
        start: f64,
        end: f64,
    ) -> CategoryTimes {
        stats_for_time_range(&mut self.cache, &self.table, key, events, start, end)
    }

    pub fn aggregated_stats_for_trace_event(&self, event: &TraceEvent, events: &[TraceEvent]) -> AggregatedStats {
        aggregated_stats_for_trace_event(&self.table, event, events)
    }

    /// CPU breakdown of `[start, end)`
    pub fn cpu_stats(&mut self, key: SeriesKey, events: &[TraceEvent], start: f64, end: f64) -> CpuStats {
        let stats = self.stats_for_time_range(key, events, start, end);
        CpuStats::from_category_times(&stats, start, end)
    }
}
