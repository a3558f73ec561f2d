//! Sampled CPU profile conversion.
//!
//! A profile is a call tree of nodes plus one node id per sample and the time
//! elapsed before each sample. This module turns it into:
//! - `JSSample` instant events carrying the sampled stack (for reconstruction)
//! - coarse `RunTask` / `FunctionCall` records wrapping runs of samples, so a
//!   standalone `.cpuprofile` has the same shape as a browser trace

use super::schema::{CallFrame, CpuProfile, ProfileNode, RawEvent};
use crate::model::event::{Phase, StackPayload, ThreadId, TraceEvent};
use crate::utils::anomaly::AnomalyLog;
use crate::utils::config::{
    CPU_PROFILE, DEVTOOLS_TIMELINE_CATEGORY, FUNCTION_CALL, JS_SAMPLE, MAIN_THREAD_NAME, RUN_TASK,
    THREAD_NAME, TOP_LEVEL_CATEGORY,
};
use crate::utils::error::ReconstructionAnomaly;
use log::{debug, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Role of a profile node, derived from its function name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Program,
    Idle,
    GarbageCollector,
    Js,
}

impl NodeKind {
    fn of(frame: &CallFrame) -> Self {
        match frame.function_name.as_str() {
            "(root)" => NodeKind::Root,
            "(program)" => NodeKind::Program,
            "(idle)" => NodeKind::Idle,
            "(garbage collector)" => NodeKind::GarbageCollector,
            _ => NodeKind::Js,
        }
    }
}

struct TreeNode {
    frame: CallFrame,
    parent: Option<u64>,
    kind: NodeKind,
}

/// Profile call tree normalised to parent links
pub struct ProfileTree {
    nodes: HashMap<u64, TreeNode>,
    stacks: HashMap<u64, Arc<[CallFrame]>>,
}

impl ProfileTree {
    /// Build the tree from nodes linked by `children`, `parent`, or both
    pub fn new(profile_nodes: &[ProfileNode]) -> Self {
        let mut nodes: HashMap<u64, TreeNode> = profile_nodes
            .iter()
            .map(|node| {
                (
                    node.id,
                    TreeNode {
                        frame: node.call_frame.clone(),
                        parent: node.parent,
                        kind: NodeKind::of(&node.call_frame),
                    },
                )
            })
            .collect();

        for node in profile_nodes {
            for child in &node.children {
                if let Some(child_node) = nodes.get_mut(child) {
                    child_node.parent = Some(node.id);
                }
            }
        }

        Self {
            nodes,
            stacks: HashMap::new(),
        }
    }

    pub fn kind(&self, id: u64) -> Option<NodeKind> {
        self.nodes.get(&id).map(|node| node.kind)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stack for a sampled node, innermost first, root excluded
    ///
    /// `(program)` maps to the empty stack. Returns `None` for unknown ids.
    pub fn stack_for(&mut self, id: u64) -> Option<Arc<[CallFrame]>> {
        if let Some(stack) = self.stacks.get(&id) {
            return Some(Arc::clone(stack));
        }

        let node = self.nodes.get(&id)?;
        let stack: Arc<[CallFrame]> = if node.kind == NodeKind::Program {
            Arc::from(Vec::new())
        } else {
            let mut frames = Vec::new();
            let mut current = Some(id);
            // Bounded by node count so a malformed cycle cannot spin forever
            for _ in 0..=self.nodes.len() {
                let Some(node) = current.and_then(|cur| self.nodes.get(&cur)) else {
                    break;
                };
                if node.parent.is_none() {
                    break;
                }
                frames.push(node.frame.clone());
                current = node.parent;
            }
            Arc::from(frames)
        };

        self.stacks.insert(id, Arc::clone(&stack));
        Some(stack)
    }
}

/// Sample timestamps in microseconds
///
/// Each sample is stamped with the profile start plus all deltas before it.
/// Returns the timestamps and the clock after the last delta.
pub fn sample_timestamps(profile: &CpuProfile) -> (Vec<f64>, f64) {
    let mut clock = profile.start_time;
    let mut timestamps = Vec::with_capacity(profile.samples.len());

    for index in 0..profile.samples.len() {
        timestamps.push(clock);
        clock += profile.time_deltas.get(index).copied().unwrap_or(0.0);
    }

    (timestamps, clock)
}

/// Generate `JSSample` events for a profile recorded on `thread`
///
/// **Public** - used for both standalone and trace-embedded profiles
///
/// # Arguments
/// * `profile` - Profile with microsecond times
/// * `thread` - Thread the samples belong to
/// * `next_ordinal` - Trace-wide ordinal counter, advanced per event
/// * `anomalies` - Receives one entry per unknown sample node
///
/// # Returns
/// Sample events in timestamp order, times in milliseconds. Idle and garbage
/// collector samples produce no event.
pub fn generate_sample_events(
    profile: &CpuProfile,
    thread: ThreadId,
    next_ordinal: &mut u64,
    anomalies: &mut AnomalyLog,
) -> Vec<TraceEvent> {
    let mut tree = ProfileTree::new(&profile.nodes);
    let (timestamps, _) = sample_timestamps(profile);

    let mut order: Vec<usize> = (0..profile.samples.len()).collect();
    if timestamps.windows(2).any(|pair| pair[1] < pair[0]) {
        warn!("Profile timestamps are not monotonic, re-sorting samples");
        order.sort_by(|a, b| timestamps[*a].total_cmp(&timestamps[*b]));
    }

    let mut events = Vec::with_capacity(order.len());
    for index in order {
        let node_id = profile.samples[index];
        match tree.kind(node_id) {
            None => {
                anomalies.report(ReconstructionAnomaly::UnknownSampleNode { index, node_id });
                continue;
            }
            Some(NodeKind::Idle) | Some(NodeKind::GarbageCollector) => continue,
            Some(_) => {}
        }

        let Some(stack) = tree.stack_for(node_id) else {
            continue;
        };

        let mut event = TraceEvent::new(
            DEVTOOLS_TIMELINE_CATEGORY,
            JS_SAMPLE,
            Phase::Instant,
            timestamps[index] / 1000.0,
            thread,
        )
        .with_ordinal(*next_ordinal);
        *next_ordinal += 1;
        event.stack = StackPayload::Sample(stack);
        events.push(event);
    }

    debug!(
        "Generated {} sample events from {} samples ({} nodes)",
        events.len(),
        profile.samples.len(),
        tree.len()
    );

    events
}

/// Convert a standalone profile into trace records
///
/// **Public** - normalises the sampled-profile input form
///
/// # Arguments
/// * `profile` - Standalone `.cpuprofile`
/// * `pid`, `tid` - Ids to attribute the records to
///
/// # Returns
/// Raw records (microseconds): a thread name, `RunTask` spans covering runs of
/// non-idle samples, `FunctionCall` spans covering runs of JS samples, and a
/// final `CpuProfile` instant carrying the profile itself.
pub fn profile_to_trace_events(profile: &CpuProfile, pid: i64, tid: i64) -> Vec<RawEvent> {
    let tree = ProfileTree::new(&profile.nodes);
    let (timestamps, clock) = sample_timestamps(profile);

    let mut builder = CoarseEventBuilder {
        events: vec![RawEvent::new("M", THREAD_NAME, 0.0, pid, tid)
            .with_category("__metadata")
            .with_args(json!({ "name": MAIN_THREAD_NAME }))],
        task: None,
        function: None,
        pid,
        tid,
    };

    for (index, &node_id) in profile.samples.iter().enumerate() {
        let now = timestamps[index];
        let Some(kind) = tree.kind(node_id) else {
            continue;
        };

        if kind == NodeKind::Idle {
            builder.close_all(now);
            continue;
        }

        builder.open_task(now);
        match kind {
            NodeKind::Js => builder.open_function(now),
            _ => builder.close_function(now),
        }
    }
    builder.close_all(clock);

    let end = profile.end_time.max(clock);
    let profile_value = serde_json::to_value(profile).unwrap_or_default();
    builder.events.push(
        RawEvent::new("I", CPU_PROFILE, end, pid, tid)
            .with_category(DEVTOOLS_TIMELINE_CATEGORY)
            .with_args(json!({ "data": { "cpuProfile": profile_value } })),
    );

    builder.events
}

/// Open task / function-call records while scanning samples
struct CoarseEventBuilder {
    events: Vec<RawEvent>,
    task: Option<usize>,
    function: Option<usize>,
    pid: i64,
    tid: i64,
}

impl CoarseEventBuilder {
    fn open_task(&mut self, now: f64) {
        if self.task.is_none() {
            self.task = Some(self.push(RUN_TASK, TOP_LEVEL_CATEGORY, now, json!({})));
        }
    }

    fn open_function(&mut self, now: f64) {
        if self.function.is_none() {
            let args = json!({ "data": { "sessionId": "1" } });
            self.function = Some(self.push(FUNCTION_CALL, DEVTOOLS_TIMELINE_CATEGORY, now, args));
        }
    }

    fn close_function(&mut self, now: f64) {
        if let Some(index) = self.function.take() {
            self.close(index, now);
        }
    }

    fn close_all(&mut self, now: f64) {
        self.close_function(now);
        if let Some(index) = self.task.take() {
            self.close(index, now);
        }
    }

    fn push(&mut self, name: &str, category: &str, now: f64, args: serde_json::Value) -> usize {
        self.events.push(
            RawEvent::new("X", name, now, self.pid, self.tid)
                .with_category(category)
                .with_args(args),
        );
        self.events.len() - 1
    }

    fn close(&mut self, index: usize, now: f64) {
        let event = &mut self.events[index];
        let start = event.ts.unwrap_or(now);
        event.dur = Some((now - start).max(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(id: u64, name: &str, children: Vec<u64>) -> ProfileNode {
        ProfileNode {
            id,
            call_frame: CallFrame::new(name, "1", "app.js", id as i64),
            children,
            parent: None,
        }
    }

    fn profile(samples: Vec<u64>, deltas: Vec<f64>) -> CpuProfile {
        CpuProfile {
            nodes: vec![
                node(1, "(root)", vec![2, 3, 4, 5, 6]),
                node(2, "(program)", vec![]),
                node(3, "(idle)", vec![]),
                node(4, "(garbage collector)", vec![]),
                node(5, "main", vec![7]),
                node(6, "other", vec![]),
                node(7, "inner", vec![]),
            ],
            start_time: 1000.0,
            end_time: 0.0,
            samples,
            time_deltas: deltas,
        }
    }

    #[test]
    fn test_stack_excludes_root_and_is_innermost_first() {
        let p = profile(vec![], vec![]);
        let mut tree = ProfileTree::new(&p.nodes);

        let stack = tree.stack_for(7).unwrap();
        let names: Vec<&str> = stack.iter().map(|f| f.function_name.as_str()).collect();
        assert_eq!(names, vec!["inner", "main"]);

        assert!(tree.stack_for(2).unwrap().is_empty());
        assert!(tree.stack_for(99).is_none());
    }

    #[test]
    fn test_parent_links_are_accepted() {
        let nodes = vec![
            ProfileNode {
                id: 1,
                call_frame: CallFrame::new("(root)", "0", "", -1),
                children: vec![],
                parent: None,
            },
            ProfileNode {
                id: 2,
                call_frame: CallFrame::new("work", "3", "a.js", 4),
                children: vec![],
                parent: Some(1),
            },
        ];
        let mut tree = ProfileTree::new(&nodes);
        assert_eq!(tree.stack_for(2).unwrap().len(), 1);
    }

    #[test]
    fn test_sample_events_skip_idle_gc_and_unknown() {
        let p = profile(vec![5, 3, 4, 7, 42, 2], vec![10.0; 6]);
        let mut ordinal = 100;
        let mut anomalies = AnomalyLog::new();

        let events = generate_sample_events(&p, ThreadId::new(1, 1), &mut ordinal, &mut anomalies);

        let times: Vec<f64> = events.iter().map(|e| e.start_time).collect();
        assert_eq!(times, vec![1.0, 1.03, 1.05]);
        assert_eq!(ordinal, 103);
        assert_eq!(anomalies.len(), 1);
        assert!(matches!(
            anomalies.entries()[0],
            ReconstructionAnomaly::UnknownSampleNode { index: 4, node_id: 42 }
        ));
    }

    #[test]
    fn test_non_monotonic_samples_are_resorted() {
        let p = profile(vec![5, 6, 7], vec![20.0, -15.0, 10.0]);
        let mut ordinal = 0;
        let mut anomalies = AnomalyLog::new();

        let events = generate_sample_events(&p, ThreadId::new(1, 1), &mut ordinal, &mut anomalies);

        let times: Vec<f64> = events.iter().map(|e| e.start_time).collect();
        assert_eq!(times, vec![1.0, 1.005, 1.02]);
    }

    #[test]
    fn test_coarse_events_wrap_sample_runs() {
        // main, main, (program), (idle), other
        let p = profile(vec![5, 5, 2, 3, 6], vec![10.0; 5]);
        let events = profile_to_trace_events(&p, 1, 1);

        let spans: Vec<(&str, f64, f64)> = events
            .iter()
            .filter(|e| e.ph == "X")
            .map(|e| (e.name.as_str(), e.ts.unwrap(), e.dur.unwrap()))
            .collect();

        assert_eq!(
            spans,
            vec![
                ("RunTask", 1000.0, 30.0),
                ("FunctionCall", 1000.0, 20.0),
                ("RunTask", 1040.0, 10.0),
                ("FunctionCall", 1040.0, 10.0),
            ]
        );
        assert_eq!(events[0].name, "thread_name");

        let last = events.last().unwrap();
        assert_eq!(last.name, "CpuProfile");
        assert_eq!(last.ts, Some(1050.0));
        assert!(last.args["data"]["cpuProfile"]["nodes"].is_array());
    }
}
