//! Typed trace events.
//!
//! All times on a [`TraceEvent`] are milliseconds.

use crate::parser::schema::CallFrame;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Structural role of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Begin,
    End,
    Complete,
    Instant,
    Metadata,
    AsyncBegin,
    AsyncStep,
    AsyncEnd,
    ObjectSnapshot,
}

impl Phase {
    /// Map a raw `ph` code to a phase
    ///
    /// Unknown codes (flow events, counters, marks) are treated as instants.
    pub fn from_code(code: &str) -> Self {
        match code {
            "B" => Phase::Begin,
            "E" => Phase::End,
            "X" => Phase::Complete,
            "M" => Phase::Metadata,
            "S" | "b" => Phase::AsyncBegin,
            "T" | "p" | "n" => Phase::AsyncStep,
            "F" | "e" => Phase::AsyncEnd,
            "O" | "N" | "D" => Phase::ObjectSnapshot,
            _ => Phase::Instant,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Phase::Begin => "B",
            Phase::End => "E",
            Phase::Complete => "X",
            Phase::Instant => "I",
            Phase::Metadata => "M",
            Phase::AsyncBegin => "b",
            Phase::AsyncStep => "n",
            Phase::AsyncEnd => "e",
            Phase::ObjectSnapshot => "O",
        }
    }

    pub fn is_async(self) -> bool {
        matches!(self, Phase::AsyncBegin | Phase::AsyncStep | Phase::AsyncEnd)
    }

    /// Phases whose records must carry a timestamp
    pub fn requires_timestamp(self) -> bool {
        matches!(
            self,
            Phase::Begin | Phase::End | Phase::Complete | Phase::Instant
        )
    }
}

/// Process/thread pair owning an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ThreadId {
    pub pid: i64,
    pub tid: i64,
}

impl ThreadId {
    pub fn new(pid: i64, tid: i64) -> Self {
        Self { pid, tid }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pid, self.tid)
    }
}

/// JS stack information attached to an event
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StackPayload {
    #[default]
    None,

    /// Sampled stack, innermost frame first
    Sample(Arc<[CallFrame]>),

    /// A single already-reconstructed frame
    Frame(CallFrame),
}

/// One ingested event
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub category: String,
    pub name: String,
    pub phase: Phase,
    pub start_time: f64,

    /// `None` for instants and metadata
    pub end_time: Option<f64>,

    /// Duration minus direct children, filled in by the tracing model
    pub self_time: f64,

    pub thread: ThreadId,

    /// Global tie-breaker, unique per trace
    pub ordinal: u64,

    /// Async / snapshot id
    pub id: Option<String>,

    pub args: Value,
    pub stack: StackPayload,
}

impl TraceEvent {
    pub fn new(category: &str, name: &str, phase: Phase, start_time: f64, thread: ThreadId) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            phase,
            start_time,
            end_time: None,
            self_time: 0.0,
            thread,
            ordinal: 0,
            id: None,
            args: Value::Null,
            stack: StackPayload::None,
        }
    }

    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_ordinal(mut self, ordinal: u64) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time
            .map(|end| (end - self.start_time).max(0.0))
            .unwrap_or(0.0)
    }

    /// End time, or start time for instants
    pub fn end_or_start(&self) -> f64 {
        self.end_time.unwrap_or(self.start_time)
    }

    /// True when the event spans time and takes part in nesting
    pub fn has_duration(&self) -> bool {
        self.duration() > 0.0
    }

    /// `args.data`, if present
    pub fn data(&self) -> Option<&Value> {
        self.args.get("data")
    }

    /// The event's own call frame, for reconstructed JS frames
    pub fn call_frame(&self) -> Option<&CallFrame> {
        match &self.stack {
            StackPayload::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    /// Sort key used everywhere events are ordered
    pub fn precedes(&self, other: &TraceEvent) -> std::cmp::Ordering {
        self.start_time
            .total_cmp(&other.start_time)
            .then(self.ordinal.cmp(&other.ordinal))
    }
}

/// Sort events by (start time, ordinal)
pub fn sort_events(events: &mut [TraceEvent]) {
    events.sort_by(|a, b| a.precedes(b));
}
