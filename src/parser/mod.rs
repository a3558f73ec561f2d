//! Trace parsing and input schema definitions.
//!
//! This module handles:
//! - Detecting the input shape (event list, envelope, CPU profile)
//! - Validating raw records
//! - Converting sampled CPU profiles into trace records
//! - Storing large payloads outside the event model

pub mod cpu_profile;
pub mod schema;
pub mod storage;
pub mod trace_events;

// Re-export main types
pub use cpu_profile::{generate_sample_events, profile_to_trace_events, NodeKind, ProfileTree};
pub use schema::{CallFrame, CpuProfile, ProfileNode, RawEvent};
pub use storage::{BackingStorage, InMemoryStorage, NullStorage, StorageHandle};
pub use trace_events::{import_trace, parse_trace_events, validate_event_list, TraceInput};
