//! Input schema definitions for raw trace data.
//!
//! This module defines the shapes we read from disk: trace event records and
//! sampled CPU profiles. Timestamps here are microseconds, as captured.

use crate::utils::config::NATIVE_RUNTIME_URL;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single raw trace record
///
/// Only `ph` is guaranteed; `ts` is required for every phase except
/// metadata (checked by [`validate_event_list`](super::trace_events::validate_event_list)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub cat: String,

    #[serde(default)]
    pub name: String,

    /// Phase code (B, E, X, I, M, ...)
    pub ph: String,

    /// Start timestamp in microseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,

    /// Duration in microseconds (Complete events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_numeric_id")]
    pub pid: i64,

    #[serde(default, deserialize_with = "deserialize_numeric_id")]
    pub tid: i64,

    /// Async / object id - can be string or number
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_string_or_number"
    )]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

impl RawEvent {
    /// Build a record with the given phase, name and timestamp
    pub fn new(ph: &str, name: &str, ts: f64, pid: i64, tid: i64) -> Self {
        Self {
            cat: String::new(),
            name: name.to_string(),
            ph: ph.to_string(),
            ts: Some(ts),
            dur: None,
            pid,
            tid,
            id: None,
            args: Value::Null,
        }
    }

    pub fn with_category(mut self, cat: &str) -> Self {
        self.cat = cat.to_string();
        self
    }

    pub fn with_duration(mut self, dur: f64) -> Self {
        self.dur = Some(dur);
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

/// One function activation site in a stack
///
/// Two frames denote the same function when script id, function name and
/// line number agree (see [`CallFrame::same_function`]). Distinct closures on
/// one line are therefore indistinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub function_name: String,

    /// Script ID (internal V8 identifier) - can be string or number
    #[serde(default, deserialize_with = "deserialize_script_id")]
    pub script_id: String,

    #[serde(default)]
    pub url: String,

    /// 0-based, -1 if unknown
    #[serde(default = "default_position")]
    pub line_number: i64,

    /// 0-based, -1 if unknown
    #[serde(default = "default_position")]
    pub column_number: i64,
}

impl CallFrame {
    pub fn new(function_name: &str, script_id: &str, url: &str, line_number: i64) -> Self {
        Self {
            function_name: function_name.to_string(),
            script_id: script_id.to_string(),
            url: url.to_string(),
            line_number,
            column_number: -1,
        }
    }

    pub fn same_function(&self, other: &CallFrame) -> bool {
        self.script_id == other.script_id
            && self.function_name == other.function_name
            && self.line_number == other.line_number
    }

    /// V8 runtime-call-stats pseudo frame
    pub fn is_native_runtime(&self) -> bool {
        self.url == NATIVE_RUNTIME_URL
    }

    pub fn is_native(&self) -> bool {
        self.url.starts_with("native ")
    }
}

/// A sampled CPU profile (standalone `.cpuprofile` form)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuProfile {
    pub nodes: Vec<ProfileNode>,

    /// Profile start time in microseconds
    #[serde(default)]
    pub start_time: f64,

    /// Profile end time in microseconds
    #[serde(default)]
    pub end_time: f64,

    /// Node id sampled at each tick
    #[serde(default)]
    pub samples: Vec<u64>,

    /// Microseconds elapsed before each sample
    #[serde(default)]
    pub time_deltas: Vec<f64>,
}

/// A node in the profile call tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNode {
    pub id: u64,

    pub call_frame: CallFrame,

    /// Child ids (standalone format)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<u64>,

    /// Parent id (trace-embedded ProfileChunk format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
}

/// Payload of a `ProfileChunk` trace event (`args.data`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChunkData {
    #[serde(default)]
    pub cpu_profile: Option<ProfileChunkCpuProfile>,

    #[serde(default)]
    pub time_deltas: Vec<f64>,
}

/// Nodes and samples added by one chunk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChunkCpuProfile {
    #[serde(default)]
    pub nodes: Vec<ProfileNode>,

    #[serde(default)]
    pub samples: Vec<u64>,
}

fn default_position() -> i64 {
    -1
}

/// Deserialize script_id which can be either a string or number.
fn deserialize_script_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(D::Error::custom("expected string or number for scriptId")),
    }
}

/// Deserialize an optional field that can be either a string or number.
fn deserialize_optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// pid/tid are numeric in Chrome traces but some tools emit strings.
fn deserialize_numeric_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    })
}
