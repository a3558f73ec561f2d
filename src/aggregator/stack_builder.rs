//! Reconstruct nested JS call frames from a thread timeline.
//!
//! Input timelines only hint at JS call boundaries: invocation events
//! (`FunctionCall`, `EventDispatch`, ...) and sparse stack samples. Walking
//! the timeline in order, we keep a stack of open frames and merge each new
//! stack into it, so consecutive samples inside one function become a single
//! continuous `JSFrame` interval.
//!
//! Example: samples A, A, B, A at 0, 10, 20, 30 inside a call ending at 40
//! produce A [0, 20), B [20, 30), A [30, 40).

use crate::model::event::{Phase, StackPayload, ThreadId, TraceEvent};
use crate::model::tracing_model::{compute_self_times, nominal_start_time};
use crate::model::walk::{walk_events, TimelineVisitor};
use crate::model::sort_events;
use crate::parser::schema::{CallFrame, RawEvent};
use crate::utils::anomaly::AnomalyLog;
use crate::utils::config::{AnalysisConfig, DEVTOOLS_TIMELINE_CATEGORY, JS_FRAME, JS_INVOCATION_EVENTS, JS_SAMPLE};
use crate::utils::error::ReconstructionAnomaly;
use log::debug;
use serde_json::json;

/// V8 runtime-call-stats groups collapsed to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeGroup {
    Parse,
    Compile,
}

/// Group of a runtime-call-stats frame name
pub fn native_group(name: &str) -> Option<NativeGroup> {
    if name.starts_with("Parse") {
        Some(NativeGroup::Parse)
    } else if name.starts_with("Compile") || name.starts_with("Recompile") {
        Some(NativeGroup::Compile)
    } else {
        None
    }
}

/// Which stack frames survive before stacks are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackFilter {
    pub show_all_events: bool,
    pub show_runtime_call_stats: bool,
    pub show_native_functions: bool,
}

impl StackFilter {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            show_all_events: config.show_all_events,
            show_runtime_call_stats: config.show_runtime_call_stats,
            show_native_functions: config.show_native_functions,
        }
    }

    /// Drop hidden frames and collapse consecutive frames of one native group
    pub fn apply(&self, stack: &mut Vec<CallFrame>) {
        if self.show_all_events {
            return;
        }

        let mut previous_group: Option<NativeGroup> = None;
        stack.retain(|frame| {
            if !self.show_native_functions && frame.is_native() {
                return false;
            }

            let runtime = frame.is_native_runtime();
            let group = if runtime {
                native_group(&frame.function_name)
            } else {
                None
            };
            if runtime && !(self.show_runtime_call_stats && group.is_some()) {
                return false;
            }

            if previous_group.is_some() && previous_group == group {
                return false;
            }
            previous_group = group;
            true
        });
    }
}

/// Events whose duration runs JavaScript
pub fn is_js_invocation_event(event: &TraceEvent) -> bool {
    JS_INVOCATION_EVENTS.contains(&event.name.as_str())
}

/// Traversal state for one thread
///
/// **Public** - driven by [`walk_events`] through [`TimelineVisitor`]
pub struct StackReconstructor {
    filter: StackFilter,

    /// Every frame emitted so far, in creation order
    frames: Vec<TraceEvent>,

    /// Indices into `frames`, innermost last
    open: Vec<usize>,

    /// One entry per open duration event: depth the open stack may not drop below
    locked_depths: Vec<usize>,

    next_ordinal: u64,

    /// A sample opened an implicit invocation that no event will close
    fake_invocation: bool,

    last_time: f64,
    anomalies: AnomalyLog,
}

impl StackReconstructor {
    /// Create a reconstructor whose ordinals start at `first_ordinal`
    pub fn new(filter: StackFilter, first_ordinal: u64) -> Self {
        Self {
            filter,
            frames: Vec::new(),
            open: Vec::new(),
            locked_depths: Vec::new(),
            next_ordinal: first_ordinal,
            fake_invocation: false,
            last_time: f64::NEG_INFINITY,
            anomalies: AnomalyLog::new(),
        }
    }

    /// Current open stack depth
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Frames still open, outermost first
    pub fn open_frames(&self) -> impl Iterator<Item = &TraceEvent> {
        self.open.iter().map(|&index| &self.frames[index])
    }

    /// Close anything still open and hand back the result
    pub fn finish(mut self) -> Reconstruction {
        if self.last_time.is_finite() {
            let last_time = self.last_time;
            for &index in &self.open {
                extend_end(&mut self.frames[index], last_time);
            }
        }
        self.open.clear();

        debug!(
            "Reconstructed {} JS frames ({} anomalies)",
            self.frames.len(),
            self.anomalies.len()
        );

        Reconstruction {
            frames: self.frames,
            anomalies: self.anomalies,
            next_ordinal: self.next_ordinal,
        }
    }

    fn take_ordinal(&mut self) -> u64 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }

    fn observe(&mut self, event: &TraceEvent) {
        self.last_time = self.last_time.max(event.end_or_start());
    }

    /// Close frames above `depth`, clamped to the locked range
    fn truncate(&mut self, mut depth: usize, time: f64) {
        if let Some(&locked) = self.locked_depths.last() {
            if depth < locked {
                self.anomalies.report(ReconstructionAnomaly::ShallowerThanLocked {
                    depth,
                    locked,
                    time,
                });
                depth = locked;
            }
        }

        if self.open.len() < depth {
            self.anomalies.report(ReconstructionAnomaly::TruncateBeyondStack {
                depth,
                size: self.open.len(),
                time,
            });
            depth = self.open.len();
        }

        for &index in &self.open {
            extend_end(&mut self.frames[index], time);
        }
        self.open.truncate(depth);
    }

    /// Merge the stack implied by `event` into the open stack
    fn extract_stack(&mut self, event: &TraceEvent, ordinal: u64) {
        let mut call_frames: Vec<CallFrame> = match &event.stack {
            StackPayload::Sample(stack) => stack.iter().rev().cloned().collect(),
            StackPayload::Frame(frame) => {
                let mut frames = self.open_call_frames();
                frames.push(frame.clone());
                frames
            }
            StackPayload::None => self.open_call_frames(),
        };
        self.filter.apply(&mut call_frames);

        let end_time = event.end_or_start();
        let shared = call_frames.len().min(self.open.len());
        let mut depth = self.locked_depths.last().copied().unwrap_or(0);

        while depth < shared {
            let index = self.open[depth];
            let same = self.frames[index]
                .call_frame()
                .map(|open| open.same_function(&call_frames[depth]))
                .unwrap_or(false);
            if !same {
                break;
            }
            extend_end(&mut self.frames[index], end_time);
            depth += 1;
        }

        self.truncate(depth, event.start_time);

        for frame in call_frames.into_iter().skip(depth) {
            let mut frame_event = TraceEvent::new(
                DEVTOOLS_TIMELINE_CATEGORY,
                JS_FRAME,
                Phase::Complete,
                event.start_time,
                event.thread,
            )
            .with_end_time(end_time)
            .with_ordinal(ordinal);
            frame_event.stack = StackPayload::Frame(frame);

            self.open.push(self.frames.len());
            self.frames.push(frame_event);
        }
    }

    fn open_call_frames(&self) -> Vec<CallFrame> {
        self.open_frames()
            .filter_map(|frame| frame.call_frame().cloned())
            .collect()
    }
}

impl TimelineVisitor for StackReconstructor {
    fn on_start(&mut self, event: &TraceEvent) {
        self.observe(event);
        if self.fake_invocation {
            let depth = self.locked_depths.pop().unwrap_or(0);
            self.truncate(depth, event.start_time);
            self.fake_invocation = false;
        }

        let ordinal = self.take_ordinal();
        if event.call_frame().is_some() {
            // An already reconstructed frame locks its parent's depth so
            // that its end closes it again.
            let depth_before = self.open.len();
            self.extract_stack(event, ordinal);
            self.locked_depths.push(depth_before);
        } else {
            self.extract_stack(event, ordinal);
            self.locked_depths.push(self.open.len());
        }
    }

    fn on_end(&mut self, event: &TraceEvent) {
        let depth = self.locked_depths.pop().unwrap_or(0);
        self.truncate(depth, event.end_or_start());
    }

    fn on_instant(&mut self, event: &TraceEvent, parent: Option<&TraceEvent>) {
        self.observe(event);
        let ordinal = self.take_ordinal();

        if parent.map(is_js_invocation_event).unwrap_or(false) || self.fake_invocation {
            self.extract_stack(event, ordinal);
        } else if event.name == JS_SAMPLE {
            if self.open.is_empty() {
                // Tracing may start inside a JS invocation: pretend one is open.
                self.fake_invocation = true;
                let depth_before = self.open.len();
                self.extract_stack(event, ordinal);
                self.locked_depths.push(depth_before);
            } else {
                self.extract_stack(event, ordinal);
            }
        }
    }
}

/// Output of one reconstruction
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Synthetic `JSFrame` events in creation order, all closed
    pub frames: Vec<TraceEvent>,
    pub anomalies: AnomalyLog,

    /// First ordinal not used by the reconstruction
    pub next_ordinal: u64,
}

/// Reconstruct JS frames for one thread timeline
///
/// **Public** - main entry point for stack reconstruction
///
/// # Arguments
/// * `events` - Thread timeline sorted by (start, ordinal)
/// * `filter` - Frame filtering options
/// * `first_ordinal` - First free ordinal of the trace
///
/// # Returns
/// Frames with non-null end times, plus any anomalies met on the way
///
/// # Example
/// ```ignore
/// let result = reconstruct_js_frames(thread.events(), StackFilter::default(), model.next_ordinal());
/// ```
pub fn reconstruct_js_frames(events: &[TraceEvent], filter: StackFilter, first_ordinal: u64) -> Reconstruction {
    debug!("Reconstructing JS frames over {} events", events.len());

    let mut reconstructor = StackReconstructor::new(filter, first_ordinal);
    walk_events(events, &mut reconstructor, nominal_start_time(events), f64::INFINITY);
    reconstructor.finish()
}

/// Merge frames into a timeline and refresh self times
pub fn merge_frames(timeline: &mut Vec<TraceEvent>, frames: &[TraceEvent]) {
    timeline.extend_from_slice(frames);
    sort_events(timeline);
    compute_self_times(timeline);
}

/// Export frames as Begin/End `JSFrame` records (microseconds)
///
/// Frames must come from one reconstruction, which nests them properly.
/// Ingesting the result and reconstructing again yields the same frames.
pub fn frames_to_trace_events(frames: &[TraceEvent]) -> Vec<RawEvent> {
    let mut ordered: Vec<&TraceEvent> = frames.iter().collect();
    ordered.sort_by(|a, b| a.precedes(b));

    let mut records = Vec::with_capacity(frames.len() * 2);
    let mut open: Vec<&TraceEvent> = Vec::new();

    for frame in ordered {
        while let Some(last) = open.last() {
            if last.end_or_start() > frame.start_time {
                break;
            }
            records.push(frame_record("E", last, last.end_or_start()));
            open.pop();
        }
        records.push(frame_record("B", frame, frame.start_time));
        open.push(frame);
    }

    while let Some(last) = open.pop() {
        records.push(frame_record("E", last, last.end_or_start()));
    }

    records
}

fn frame_record(phase: &str, frame: &TraceEvent, time_ms: f64) -> RawEvent {
    let ThreadId { pid, tid } = frame.thread;
    let record = RawEvent::new(phase, JS_FRAME, time_ms * 1000.0, pid, tid).with_category(DEVTOOLS_TIMELINE_CATEGORY);
    match (phase, frame.call_frame()) {
        ("B", Some(call_frame)) => record.with_args(json!({ "data": call_frame })),
        _ => record,
    }
}

fn extend_end(frame: &mut TraceEvent, time: f64) {
    let end = frame.end_or_start().max(time);
    frame.end_time = Some(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const THREAD: ThreadId = ThreadId { pid: 1, tid: 1 };

    fn frame(name: &str) -> CallFrame {
        CallFrame::new(name, "1", "app.js", name.len() as i64)
    }

    fn sample(time: f64, stack: &[&str], ordinal: u64) -> TraceEvent {
        let frames: Vec<CallFrame> = stack.iter().map(|name| frame(name)).collect();
        let mut event = TraceEvent::new(DEVTOOLS_TIMELINE_CATEGORY, JS_SAMPLE, Phase::Instant, time, THREAD)
            .with_ordinal(ordinal);
        event.stack = StackPayload::Sample(Arc::from(frames));
        event
    }

    fn function_call(start: f64, end: f64, ordinal: u64) -> TraceEvent {
        TraceEvent::new(DEVTOOLS_TIMELINE_CATEGORY, "FunctionCall", Phase::Complete, start, THREAD)
            .with_end_time(end)
            .with_ordinal(ordinal)
    }

    fn spans(frames: &[TraceEvent]) -> Vec<(String, f64, f64)> {
        frames
            .iter()
            .map(|f| {
                let name = f.call_frame().map(|c| c.function_name.clone()).unwrap_or_default();
                (name, f.start_time, f.end_or_start())
            })
            .collect()
    }

    #[test]
    fn test_consecutive_samples_merge() {
        let events = vec![
            function_call(0.0, 40.0, 1),
            sample(0.0, &["A"], 2),
            sample(10.0, &["A"], 3),
            sample(20.0, &["B"], 4),
            sample(30.0, &["A"], 5),
        ];

        let result = reconstruct_js_frames(&events, StackFilter::default(), 100);

        assert_eq!(
            spans(&result.frames),
            vec![
                ("A".to_string(), 0.0, 20.0),
                ("B".to_string(), 20.0, 30.0),
                ("A".to_string(), 30.0, 40.0),
            ]
        );
        assert!(result.anomalies.is_empty());
    }

    #[test]
    fn test_deeper_stack_extends_common_prefix() {
        // Stacks are innermost first
        let events = vec![
            function_call(0.0, 30.0, 1),
            sample(0.0, &["main"], 2),
            sample(10.0, &["child", "main"], 3),
            sample(20.0, &["main"], 4),
        ];

        let result = reconstruct_js_frames(&events, StackFilter::default(), 100);

        assert_eq!(
            spans(&result.frames),
            vec![("main".to_string(), 0.0, 30.0), ("child".to_string(), 10.0, 20.0)]
        );
    }

    #[test]
    fn test_orphan_samples_open_fake_invocation() {
        let task = |start: f64, ordinal: u64| {
            TraceEvent::new("toplevel", "RunTask", Phase::Complete, start, THREAD)
                .with_end_time(start + 5.0)
                .with_ordinal(ordinal)
        };
        let events = vec![
            task(0.0, 1),
            sample(10.0, &["A"], 2),
            sample(15.0, &["A"], 3),
            task(20.0, 4),
        ];

        let result = reconstruct_js_frames(&events, StackFilter::default(), 10);

        // The next task closes the implicit invocation
        assert_eq!(spans(&result.frames), vec![("A".to_string(), 10.0, 20.0)]);
        assert!(result.anomalies.is_empty());
    }

    #[test]
    fn test_nested_invocation_cannot_truncate_parent() {
        let mut reconstructor = StackReconstructor::new(StackFilter::default(), 1);
        let outer = function_call(0.0, 50.0, 1);
        reconstructor.on_start(&outer);
        reconstructor.on_instant(&sample(1.0, &["outer"], 2), Some(&outer));

        let inner = TraceEvent::new("", "EventDispatch", Phase::Complete, 5.0, THREAD)
            .with_end_time(10.0)
            .with_ordinal(3);
        reconstructor.on_start(&inner);
        assert_eq!(reconstructor.depth(), 1);

        // A sample that disagrees with the locked prefix cannot close `outer`
        reconstructor.on_instant(&sample(6.0, &["other"], 4), Some(&inner));
        assert_eq!(reconstructor.depth(), 1);

        reconstructor.on_instant(&sample(7.0, &["handler", "outer"], 5), Some(&inner));
        assert_eq!(reconstructor.depth(), 2);

        reconstructor.on_end(&inner);
        assert_eq!(reconstructor.depth(), 1);
        reconstructor.on_end(&outer);
        assert_eq!(reconstructor.depth(), 0);

        let result = reconstructor.finish();
        assert!(result.anomalies.is_empty());
        assert_eq!(result.frames.len(), 2);
    }

    #[test]
    fn test_truncate_beyond_stack_is_clamped() {
        let mut reconstructor = StackReconstructor::new(StackFilter::default(), 1);
        reconstructor.locked_depths.push(3);
        reconstructor.truncate(5, 1.0);

        let result = reconstructor.finish();
        assert_eq!(result.anomalies.len(), 1);
        assert!(matches!(
            result.anomalies.entries()[0],
            ReconstructionAnomaly::TruncateBeyondStack { depth: 5, size: 0, .. }
        ));
    }

    #[test]
    fn test_filter_drops_native_and_collapses_groups() {
        let runtime = |name: &str| CallFrame::new(name, "0", "native V8Runtime", -1);
        let mut stack = vec![
            frame("main"),
            runtime("ParseLazy"),
            runtime("ParseProgram"),
            runtime("CompileLazy"),
            CallFrame::new("push", "0", "native array.js", 1),
        ];

        let mut hidden = stack.clone();
        StackFilter::default().apply(&mut hidden);
        assert_eq!(hidden.len(), 1);

        let filter = StackFilter {
            show_runtime_call_stats: true,
            show_native_functions: true,
            ..Default::default()
        };
        filter.apply(&mut stack);
        let names: Vec<&str> = stack.iter().map(|f| f.function_name.as_str()).collect();
        assert_eq!(names, vec!["main", "ParseLazy", "CompileLazy", "push"]);
    }

    #[test]
    fn test_export_nests_begin_end() {
        let events = vec![
            function_call(0.0, 30.0, 1),
            sample(0.0, &["main"], 2),
            sample(10.0, &["child", "main"], 3),
            sample(20.0, &["main"], 4),
        ];
        let result = reconstruct_js_frames(&events, StackFilter::default(), 100);

        let records = frames_to_trace_events(&result.frames);
        let shape: Vec<(&str, f64)> = records.iter().map(|r| (r.ph.as_str(), r.ts.unwrap())).collect();
        assert_eq!(
            shape,
            vec![("B", 0.0), ("B", 10000.0), ("E", 20000.0), ("E", 30000.0)]
        );
        assert_eq!(records[0].args["data"]["functionName"], "main");
    }

    #[test]
    fn test_native_groups() {
        assert_eq!(native_group("ParseFunctionLiteral"), Some(NativeGroup::Parse));
        assert_eq!(native_group("RecompileSynchronous"), Some(NativeGroup::Compile));
        assert_eq!(native_group("GC_Scavenger"), None);
    }
}
