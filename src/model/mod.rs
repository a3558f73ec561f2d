//! In-memory trace model.
//!
//! This module handles:
//! - Typed events and phases
//! - Per-thread timelines built from raw records
//! - Nesting-aware traversal shared by the analyses

pub mod event;
pub mod tracing_model;
pub mod walk;

// Re-export main types
pub use event::{sort_events, Phase, StackPayload, ThreadId, TraceEvent};
pub use tracing_model::{
    compute_self_times, is_top_level_event, nominal_start_time, ObjectSnapshot, Thread, TracingModel,
};
pub use walk::{walk_events, TimelineVisitor};
