//! Per-thread event model built from validated raw records.
//!
//! Ingestion assigns ordinals in input order, converts microseconds to
//! milliseconds, pairs Begin/End records, assembles async spans, expands
//! embedded CPU profiles into sample events and computes self times.

use super::event::{sort_events, Phase, StackPayload, ThreadId, TraceEvent};
use crate::parser::cpu_profile::generate_sample_events;
use crate::parser::schema::{CallFrame, CpuProfile, ProfileChunkData, ProfileNode, RawEvent};
use crate::parser::storage::{BackingStorage, StorageHandle};
use crate::utils::anomaly::AnomalyLog;
use crate::utils::config::{
    CPU_PROFILE, DEVTOOLS_TIMELINE_CATEGORY, JS_FRAME, JS_SAMPLE, LARGE_PAYLOAD_BYTES,
    LEGACY_TIMELINE_CATEGORY, MAIN_THREAD_NAME, PROCESS_NAME, PROFILE, PROFILE_CHUNK, PROGRAM,
    RUN_TASK, THREAD_NAME, TOP_LEVEL_CATEGORY,
};
use crate::utils::error::ReconstructionAnomaly;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One process/thread timeline
#[derive(Debug, Clone)]
pub struct Thread {
    id: ThreadId,
    name: Option<String>,
    events: Vec<TraceEvent>,
    async_events: Vec<TraceEvent>,
}

impl Thread {
    fn new(id: ThreadId) -> Self {
        Self {
            id,
            name: None,
            events: Vec::new(),
            async_events: Vec::new(),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sync events sorted by (start, ordinal)
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Paired async spans, sorted by (start, ordinal)
    pub fn async_events(&self) -> &[TraceEvent] {
        &self.async_events
    }

    fn duration_event_count(&self) -> usize {
        self.events.iter().filter(|e| e.has_duration()).count()
    }
}

/// An object snapshot whose payload was moved to backing storage
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot {
    pub thread: ThreadId,
    pub name: String,
    pub id: Option<String>,
    pub time: f64,
    pub handle: Option<StorageHandle>,
}

/// Profile pieces collected from `Profile` / `ProfileChunk` records
struct ProfileAssembly {
    thread: ThreadId,
    start_time: f64,
    nodes: Vec<ProfileNode>,
    samples: Vec<u64>,
    time_deltas: Vec<f64>,
}

/// The whole ingested trace
///
/// **Public** - owned by one analysis, never shared across traces
pub struct TracingModel {
    threads: BTreeMap<ThreadId, Thread>,
    process_names: BTreeMap<i64, String>,
    snapshots: Vec<ObjectSnapshot>,
    storage: Box<dyn BackingStorage + Send>,
    anomalies: AnomalyLog,
    next_ordinal: u64,
    min_time: f64,
    max_time: f64,
}

impl TracingModel {
    /// Build the model from raw records already validated by the parser
    ///
    /// **Public** - main entry point for the event model
    ///
    /// # Arguments
    /// * `raw_events` - Records in input order (microseconds)
    /// * `storage` - Destination for large payloads
    ///
    /// # Returns
    /// The per-thread model. Inconsistencies are recorded as anomalies and
    /// never fail the build.
    pub fn build(raw_events: &[RawEvent], storage: Box<dyn BackingStorage + Send>) -> Self {
        let mut model = Self {
            threads: BTreeMap::new(),
            process_names: BTreeMap::new(),
            snapshots: Vec::new(),
            storage,
            anomalies: AnomalyLog::new(),
            next_ordinal: 1,
            min_time: f64::INFINITY,
            max_time: f64::NEG_INFINITY,
        };

        let mut ingest = Ingest::default();
        for raw in raw_events {
            model.add_event(raw, &mut ingest);
        }
        model.finish(ingest);
        model
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    pub fn process_name(&self, pid: i64) -> Option<&str> {
        self.process_names.get(&pid).map(String::as_str)
    }

    pub fn object_snapshots(&self) -> &[ObjectSnapshot] {
        &self.snapshots
    }

    /// Read a snapshot payload back from storage
    pub fn snapshot_payload(&self, snapshot: &ObjectSnapshot) -> Option<Value> {
        let text = self.storage.load(snapshot.handle?)?;
        serde_json::from_str(&text).ok()
    }

    pub fn anomalies(&self) -> &AnomalyLog {
        &self.anomalies
    }

    pub fn take_anomalies(&mut self) -> AnomalyLog {
        std::mem::take(&mut self.anomalies)
    }

    /// First ordinal not used by any ingested event
    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    /// Earliest timestamp in the trace (ms), 0 for an empty trace
    pub fn min_time(&self) -> f64 {
        if self.min_time.is_finite() {
            self.min_time
        } else {
            0.0
        }
    }

    /// Latest start or end time in the trace (ms), 0 for an empty trace
    pub fn max_time(&self) -> f64 {
        if self.max_time.is_finite() {
            self.max_time
        } else {
            0.0
        }
    }

    /// Pick the renderer main thread
    ///
    /// Prefers the busiest thread named `CrRendererMain`, otherwise the thread
    /// with the most duration events.
    pub fn main_thread(&self) -> Option<ThreadId> {
        let named = self
            .threads
            .values()
            .filter(|t| t.name() == Some(MAIN_THREAD_NAME))
            .max_by_key(|t| t.events.len());

        named
            .or_else(|| {
                self.threads
                    .values()
                    .filter(|t| !t.events.is_empty())
                    .max_by_key(|t| t.duration_event_count())
            })
            .map(Thread::id)
    }

    fn thread_mut(&mut self, id: ThreadId) -> &mut Thread {
        self.threads.entry(id).or_insert_with(|| Thread::new(id))
    }

    fn take_ordinal(&mut self) -> u64 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }

    fn observe_time(&mut self, time: f64) {
        self.min_time = self.min_time.min(time);
        self.max_time = self.max_time.max(time);
    }

    fn add_event(&mut self, raw: &RawEvent, ingest: &mut Ingest) {
        let phase = Phase::from_code(&raw.ph);
        let thread = ThreadId::new(raw.pid, raw.tid);
        if phase != Phase::Metadata && raw.ts.is_none() {
            self.anomalies.report(ReconstructionAnomaly::MissingTimestamp {
                name: raw.name.clone(),
                phase: raw.ph.clone(),
            });
            return;
        }
        let ordinal = self.take_ordinal();
        let start = raw.ts.unwrap_or(0.0) / 1000.0;

        if phase == Phase::Metadata {
            self.add_metadata(raw, thread);
            return;
        }

        self.observe_time(start);

        let mut event = TraceEvent::new(&raw.cat, &raw.name, phase, start, thread)
            .with_ordinal(ordinal)
            .with_args(raw.args.clone());
        event.id = raw.id.clone();
        event.stack = stack_payload(raw);

        match phase {
            Phase::Begin => {
                ingest.open_begins.entry(thread).or_default().push(event);
                self.thread_mut(thread);
            }
            Phase::End => self.close_begin(event, ingest),
            Phase::Complete => {
                let end = start + raw.dur.unwrap_or(0.0).max(0.0) / 1000.0;
                self.observe_time(end);
                event.end_time = Some(end);
                self.thread_mut(thread).events.push(event);
            }
            Phase::AsyncBegin | Phase::AsyncStep | Phase::AsyncEnd => {
                self.add_async(event, ingest);
            }
            Phase::ObjectSnapshot => self.add_snapshot(event),
            Phase::Instant | Phase::Metadata => {
                if raw.name == PROFILE || raw.name == PROFILE_CHUNK {
                    collect_profile_piece(raw, &event, ingest);
                    self.stash_large_args(&mut event);
                } else if raw.name == CPU_PROFILE {
                    if let Some(profile) = embedded_cpu_profile(&event.args) {
                        ingest.whole_profiles.push((thread, profile));
                    }
                    self.stash_large_args(&mut event);
                }
                self.thread_mut(thread).events.push(event);
            }
        }
    }

    fn add_metadata(&mut self, raw: &RawEvent, thread: ThreadId) {
        let name = raw.args.get("name").and_then(Value::as_str);
        match (raw.name.as_str(), name) {
            (THREAD_NAME, Some(name)) => self.thread_mut(thread).name = Some(name.to_string()),
            (PROCESS_NAME, Some(name)) => {
                self.process_names.insert(raw.pid, name.to_string());
            }
            _ => {}
        }
    }

    fn close_begin(&mut self, end: TraceEvent, ingest: &mut Ingest) {
        let thread = end.thread;
        let Some(mut begin) = ingest
            .open_begins
            .get_mut(&thread)
            .and_then(|stack| stack.pop())
        else {
            self.anomalies.report(ReconstructionAnomaly::UnmatchedEnd {
                name: end.name,
                time: end.start_time,
                pid: thread.pid,
                tid: thread.tid,
            });
            return;
        };

        if !end.name.is_empty() && begin.name != end.name {
            warn!(
                "Begin/end event mismatch for '{}' / '{}' at {}",
                begin.name, end.name, end.start_time
            );
        }

        merge_args(&mut begin.args, end.args);
        begin.phase = Phase::Complete;
        begin.end_time = Some(end.start_time.max(begin.start_time));
        self.thread_mut(begin.thread).events.push(begin);
    }

    fn add_async(&mut self, event: TraceEvent, ingest: &mut Ingest) {
        let key = AsyncKey {
            pid: event.thread.pid,
            category: event.category.clone(),
            name: event.name.clone(),
            id: event.id.clone().unwrap_or_default(),
        };

        match event.phase {
            Phase::AsyncBegin => {
                ingest.open_async.insert(key, event);
            }
            Phase::AsyncStep => match ingest.open_async.get_mut(&key) {
                Some(open) => merge_args(&mut open.args, event.args),
                None => debug!("Async step '{}' without begin", event.name),
            },
            _ => match ingest.open_async.remove(&key) {
                Some(mut open) => {
                    merge_args(&mut open.args, event.args);
                    open.end_time = Some(event.start_time.max(open.start_time));
                    self.thread_mut(open.thread).async_events.push(open);
                }
                None => debug!("Async end '{}' without begin", event.name),
            },
        }
    }

    fn add_snapshot(&mut self, event: TraceEvent) {
        let handle = event
            .args
            .get("snapshot")
            .and_then(|snapshot| self.storage.append_accessible_string(&snapshot.to_string()));

        self.snapshots.push(ObjectSnapshot {
            thread: event.thread,
            name: event.name,
            id: event.id,
            time: event.start_time,
            handle,
        });
    }

    /// Move a large argument payload out of the event into storage
    fn stash_large_args(&mut self, event: &mut TraceEvent) {
        let text = event.args.to_string();
        if text.len() > LARGE_PAYLOAD_BYTES {
            self.storage.append_string(&text);
            event.args = Value::Null;
        }
    }

    fn finish(&mut self, ingest: Ingest) {
        let Ingest {
            open_begins,
            open_async,
            whole_profiles,
            profile_parts,
        } = ingest;
        let trace_end = self.max_time();

        for (thread, stack) in open_begins {
            for mut begin in stack {
                self.anomalies.report(ReconstructionAnomaly::UnclosedBegin {
                    name: begin.name.clone(),
                    time: begin.start_time,
                });
                begin.phase = Phase::Complete;
                begin.end_time = Some(trace_end.max(begin.start_time));
                self.thread_mut(thread).events.push(begin);
            }
        }

        for (_, mut open) in open_async {
            debug!("Async event '{}' never ended, closing at trace end", open.name);
            open.end_time = Some(trace_end.max(open.start_time));
            self.thread_mut(open.thread).async_events.push(open);
        }

        let mut profiles = whole_profiles;
        for (_, part) in profile_parts {
            let profile = CpuProfile {
                nodes: part.nodes,
                start_time: part.start_time,
                end_time: 0.0,
                samples: part.samples,
                time_deltas: part.time_deltas,
            };
            profiles.push((part.thread, profile));
        }

        for (thread, profile) in profiles {
            let samples =
                generate_sample_events(&profile, thread, &mut self.next_ordinal, &mut self.anomalies);
            if let Some(last) = samples.last() {
                self.observe_time(last.start_time);
            }
            self.thread_mut(thread).events.extend(samples);
        }

        for thread in self.threads.values_mut() {
            sort_events(&mut thread.events);
            sort_events(&mut thread.async_events);
            compute_self_times(&mut thread.events);
        }

        self.storage.finish_writing();

        debug!(
            "Tracing model: {} threads, {} snapshots, {} anomalies",
            self.threads.len(),
            self.snapshots.len(),
            self.anomalies.len()
        );
    }
}

/// Transient state used only while records are being added
#[derive(Default)]
struct Ingest {
    open_begins: BTreeMap<ThreadId, Vec<TraceEvent>>,
    open_async: HashMap<AsyncKey, TraceEvent>,
    whole_profiles: Vec<(ThreadId, CpuProfile)>,
    profile_parts: BTreeMap<(i64, String), ProfileAssembly>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AsyncKey {
    pid: i64,
    category: String,
    name: String,
    id: String,
}

/// Set `self_time` to duration minus direct children
///
/// **Public** - rerun after reconstructed frames are merged into a timeline
///
/// Events must be sorted by (start, ordinal). Children overhanging their
/// parent only count the overlapping part; results are clamped at 0.
pub fn compute_self_times(events: &mut [TraceEvent]) {
    let mut open: Vec<usize> = Vec::new();

    for index in 0..events.len() {
        events[index].self_time = events[index].duration();
        if !events[index].has_duration() || events[index].phase.is_async() {
            continue;
        }

        let start = events[index].start_time;
        while let Some(&top) = open.last() {
            if events[top].end_or_start() > start {
                break;
            }
            open.pop();
        }

        if let Some(&parent) = open.last() {
            let child_end = events[index].end_or_start().min(events[parent].end_or_start());
            let overlap = (child_end - start).max(0.0);
            events[parent].self_time = (events[parent].self_time - overlap).max(0.0);
        }
        open.push(index);
    }
}

/// Whether `category` (comma separated) contains `wanted`
pub fn has_category(category: &str, wanted: &str) -> bool {
    category.split(',').any(|c| c.trim() == wanted)
}

/// Page task boundary events
pub fn is_top_level_event(event: &TraceEvent) -> bool {
    if has_category(&event.category, TOP_LEVEL_CATEGORY) {
        return true;
    }
    let timeline = has_category(&event.category, DEVTOOLS_TIMELINE_CATEGORY)
        || has_category(&event.category, LEGACY_TIMELINE_CATEGORY);
    timeline && (event.name == RUN_TASK || event.name == PROGRAM)
}

/// Start of the first top-level event, or 0
pub fn nominal_start_time(events: &[TraceEvent]) -> f64 {
    events
        .iter()
        .find(|e| is_top_level_event(e))
        .map(|e| e.start_time)
        .unwrap_or(0.0)
}

/// Pull stack information out of `JSSample` / `JSFrame` args
fn stack_payload(raw: &RawEvent) -> StackPayload {
    let data = raw.args.get("data");
    if raw.name == JS_SAMPLE {
        let frames = data
            .and_then(|d| d.get("stackTrace"))
            .cloned()
            .and_then(|v| serde_json::from_value::<Vec<CallFrame>>(v).ok());
        if let Some(frames) = frames {
            return StackPayload::Sample(Arc::from(frames));
        }
    } else if raw.name == JS_FRAME {
        if let Some(frame) = data.cloned().and_then(|v| serde_json::from_value::<CallFrame>(v).ok()) {
            return StackPayload::Frame(frame);
        }
    }
    StackPayload::None
}

fn embedded_cpu_profile(args: &Value) -> Option<CpuProfile> {
    let profile = args.get("data")?.get("cpuProfile")?.clone();
    match serde_json::from_value(profile) {
        Ok(profile) => Some(profile),
        Err(err) => {
            warn!("Ignoring unreadable embedded CPU profile: {}", err);
            None
        }
    }
}

fn collect_profile_piece(raw: &RawEvent, event: &TraceEvent, ingest: &mut Ingest) {
    let key = (raw.pid, raw.id.clone().unwrap_or_default());
    let data = raw.args.get("data").cloned().unwrap_or(Value::Null);

    if raw.name == PROFILE {
        let start_time = data
            .get("startTime")
            .and_then(Value::as_f64)
            .or(raw.ts)
            .unwrap_or(0.0);
        let part = ingest.profile_parts.entry(key).or_insert_with(|| ProfileAssembly {
            thread: event.thread,
            start_time,
            nodes: Vec::new(),
            samples: Vec::new(),
            time_deltas: Vec::new(),
        });
        part.thread = event.thread;
        part.start_time = start_time;
        return;
    }

    let chunk: ProfileChunkData = match serde_json::from_value(data) {
        Ok(chunk) => chunk,
        Err(err) => {
            warn!("Ignoring unreadable profile chunk: {}", err);
            return;
        }
    };

    let Some(part) = ingest.profile_parts.get_mut(&key) else {
        warn!("Profile chunk for unknown profile id '{}'", key.1);
        return;
    };
    if let Some(profile) = chunk.cpu_profile {
        part.nodes.extend(profile.nodes);
        part.samples.extend(profile.samples);
    }
    part.time_deltas.extend(chunk.time_deltas);
}

/// Shallow-merge object `extra` into `target`
fn merge_args(target: &mut Value, extra: Value) {
    match (target, extra) {
        (Value::Object(target), Value::Object(extra)) => {
            for (key, value) in extra {
                target.insert(key, value);
            }
        }
        (target @ Value::Null, extra) => *target = extra,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::storage::{InMemoryStorage, NullStorage};
    use serde_json::json;

    fn build(raw: Vec<RawEvent>) -> TracingModel {
        TracingModel::build(&raw, Box::new(NullStorage))
    }

    #[test]
    fn test_begin_end_pairing_and_units() {
        let model = build(vec![
            RawEvent::new("B", "Outer", 1000.0, 1, 1),
            RawEvent::new("B", "Inner", 2000.0, 1, 1),
            RawEvent::new("E", "Inner", 3000.0, 1, 1),
            RawEvent::new("E", "Outer", 5000.0, 1, 1),
        ]);

        let thread = model.thread(ThreadId::new(1, 1)).unwrap();
        let events = thread.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "Outer");
        assert_eq!(events[0].end_time, Some(5.0));
        assert_eq!(events[0].self_time, 3.0);
        assert_eq!(events[1].name, "Inner");
        assert_eq!(events[1].phase, Phase::Complete);
        assert!(model.anomalies().is_empty());
    }

    #[test]
    fn test_unmatched_and_unclosed_are_anomalies() {
        let mut model = build(vec![
            RawEvent::new("E", "Stray", 500.0, 1, 1),
            RawEvent::new("B", "Open", 1000.0, 1, 1),
            RawEvent::new("X", "Task", 1000.0, 1, 1).with_duration(4000.0),
        ]);

        let anomalies = model.take_anomalies();
        assert_eq!(anomalies.len(), 2);
        assert!(matches!(anomalies.entries()[0], ReconstructionAnomaly::UnmatchedEnd { .. }));
        assert!(matches!(anomalies.entries()[1], ReconstructionAnomaly::UnclosedBegin { .. }));

        let thread = model.thread(ThreadId::new(1, 1)).unwrap();
        let open = thread.events().iter().find(|e| e.name == "Open").unwrap();
        assert_eq!(open.end_time, Some(5.0));
    }

    #[test]
    fn test_ordinals_follow_input_order_across_threads() {
        let model = build(vec![
            RawEvent::new("I", "a", 10.0, 1, 2),
            RawEvent::new("I", "b", 5.0, 1, 1),
            RawEvent::new("I", "c", 5.0, 1, 2),
        ]);

        let t2 = model.thread(ThreadId::new(1, 2)).unwrap();
        let ordinals: Vec<u64> = t2.events().iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![3, 1]);
        assert_eq!(model.next_ordinal(), 4);
    }

    #[test]
    fn test_async_spans_are_paired() {
        let model = build(vec![
            RawEvent::new("b", "Fetch", 0.0, 1, 1).with_id("7").with_category("net"),
            RawEvent::new("n", "Fetch", 500.0, 1, 1).with_id("7").with_category("net"),
            RawEvent::new("e", "Fetch", 2000.0, 1, 3).with_id("7").with_category("net"),
        ]);

        let thread = model.thread(ThreadId::new(1, 1)).unwrap();
        assert!(thread.events().is_empty());
        assert_eq!(thread.async_events().len(), 1);
        assert_eq!(thread.async_events()[0].end_time, Some(2.0));
    }

    #[test]
    fn test_untimed_records_are_skipped() {
        let mut snapshot = RawEvent::new("O", "LayerTree", 0.0, 1, 1).with_id("3");
        snapshot.ts = None;
        let mut step = RawEvent::new("n", "Fetch", 0.0, 1, 1).with_id("7");
        step.ts = None;

        let mut model = build(vec![
            RawEvent::new("X", "Task", 8000.0, 1, 1).with_duration(2000.0),
            snapshot,
            step,
        ]);

        assert!(model.object_snapshots().is_empty());
        assert_eq!(model.min_time(), 8.0);
        assert_eq!(model.next_ordinal(), 2);

        let anomalies = model.take_anomalies();
        assert_eq!(anomalies.len(), 2);
        assert!(matches!(
            &anomalies.entries()[0],
            ReconstructionAnomaly::MissingTimestamp { phase, .. } if phase == "O"
        ));
    }

    #[test]
    fn test_metadata_names_and_main_thread() {
        let model = build(vec![
            RawEvent::new("M", "thread_name", 0.0, 1, 5).with_args(json!({"name": "CrRendererMain"})),
            RawEvent::new("M", "process_name", 0.0, 1, 5).with_args(json!({"name": "Renderer"})),
            RawEvent::new("X", "Busy", 0.0, 1, 9).with_duration(10.0),
            RawEvent::new("X", "Busy", 20.0, 1, 9).with_duration(10.0),
            RawEvent::new("X", "Task", 0.0, 1, 5).with_duration(10.0),
        ]);

        assert_eq!(model.main_thread(), Some(ThreadId::new(1, 5)));
        assert_eq!(model.process_name(1), Some("Renderer"));
    }

    #[test]
    fn test_snapshots_go_to_storage() {
        let raw = vec![RawEvent::new("O", "Layer", 0.0, 1, 1)
            .with_id("0x1")
            .with_args(json!({"snapshot": {"size": 3}}))];
        let model = TracingModel::build(&raw, Box::new(InMemoryStorage::new()));

        let snapshot = &model.object_snapshots()[0];
        assert_eq!(snapshot.id.as_deref(), Some("0x1"));
        assert_eq!(model.snapshot_payload(snapshot), Some(json!({"size": 3})));
    }

    #[test]
    fn test_profile_chunks_become_samples() {
        let model = build(vec![
            RawEvent::new("P", "Profile", 0.0, 1, 1)
                .with_id("0x1")
                .with_args(json!({"data": {"startTime": 1000}})),
            RawEvent::new("P", "ProfileChunk", 10.0, 1, 1)
                .with_id("0x1")
                .with_args(json!({"data": {
                    "cpuProfile": {
                        "nodes": [
                            {"id": 1, "callFrame": {"functionName": "(root)", "scriptId": 0}},
                            {"id": 2, "parent": 1, "callFrame": {"functionName": "work", "scriptId": 3, "lineNumber": 1}}
                        ],
                        "samples": [2, 2]
                    },
                    "timeDeltas": [0, 100]
                }})),
        ]);

        let thread = model.thread(ThreadId::new(1, 1)).unwrap();
        let samples: Vec<&TraceEvent> = thread.events().iter().filter(|e| e.name == JS_SAMPLE).collect();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].start_time, 1.0);
        assert_eq!(samples[1].start_time, 1.0);
        assert!(matches!(samples[0].stack, StackPayload::Sample(ref s) if s.len() == 1));
    }

    #[test]
    fn test_self_time_clips_overhanging_child() {
        let thread = ThreadId::new(1, 1);
        let mut events = vec![
            TraceEvent::new("", "Parent", Phase::Complete, 0.0, thread).with_end_time(10.0).with_ordinal(1),
            TraceEvent::new("", "Child", Phase::Complete, 6.0, thread).with_end_time(14.0).with_ordinal(2),
        ];
        compute_self_times(&mut events);
        assert_eq!(events[0].self_time, 6.0);
        assert_eq!(events[1].self_time, 8.0);
    }

    #[test]
    fn test_top_level_detection() {
        let thread = ThreadId::new(1, 1);
        let run_task = TraceEvent::new(DEVTOOLS_TIMELINE_CATEGORY, "RunTask", Phase::Complete, 0.0, thread);
        let tagged = TraceEvent::new("foo,toplevel", "ThreadControllerImpl::RunTask", Phase::Complete, 0.0, thread);
        let other = TraceEvent::new("v8", "RunTask", Phase::Complete, 0.0, thread);

        assert!(is_top_level_event(&run_task));
        assert!(is_top_level_event(&tagged));
        assert!(!is_top_level_event(&other));
    }
}
