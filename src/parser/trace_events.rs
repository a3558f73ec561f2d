//! Input detection and structural validation.
//!
//! A capture arrives as one of three JSON shapes. It is resolved once into a
//! [`TraceInput`] and normalised to raw trace records, so everything
//! downstream handles a single representation.

use super::cpu_profile::profile_to_trace_events;
use super::schema::{CpuProfile, RawEvent};
use super::storage::BackingStorage;
use crate::model::event::Phase;
use crate::model::tracing_model::TracingModel;
use crate::utils::error::ParseError;
use log::debug;
use serde_json::Value;

/// Ids used for records synthesised from a standalone CPU profile
const PROFILE_PID: i64 = 1;
const PROFILE_TID: i64 = 1;

/// The accepted input shapes
#[derive(Debug, Clone)]
pub enum TraceInput<'a> {
    /// Bare array of records
    EventList(&'a [Value]),

    /// `{ "traceEvents": [...] }` envelope
    Envelope(&'a [Value]),

    /// Standalone sampled CPU profile
    CpuProfile(&'a Value),
}

impl<'a> TraceInput<'a> {
    /// Classify a parsed JSON document
    ///
    /// # Errors
    /// * `ParseError::InvalidFormat` - None of the accepted shapes
    pub fn detect(raw: &'a Value) -> Result<Self, ParseError> {
        match raw {
            Value::Array(events) => Ok(TraceInput::EventList(events)),
            Value::Object(obj) => {
                if let Some(events) = obj.get("traceEvents") {
                    return events
                        .as_array()
                        .map(|events| TraceInput::Envelope(events.as_slice()))
                        .ok_or_else(|| {
                            ParseError::InvalidFormat("'traceEvents' is not an array".to_string())
                        });
                }
                if obj.get("nodes").map(Value::is_array).unwrap_or(false) {
                    return Ok(TraceInput::CpuProfile(raw));
                }
                Err(ParseError::InvalidFormat(
                    "object has neither 'traceEvents' nor CPU profile 'nodes'".to_string(),
                ))
            }
            _ => Err(ParseError::InvalidFormat(
                "expected a JSON array or object".to_string(),
            )),
        }
    }

    /// Normalise to raw records
    ///
    /// # Errors
    /// * `ParseError::MalformedTrace` - First record failing validation
    /// * `ParseError::JsonError` - CPU profile does not deserialize
    pub fn into_raw_events(self) -> Result<Vec<RawEvent>, ParseError> {
        match self {
            TraceInput::EventList(events) | TraceInput::Envelope(events) => {
                validate_event_list(events)?;
                events
                    .iter()
                    .enumerate()
                    .map(|(index, value)| {
                        serde_json::from_value(value.clone()).map_err(|e| ParseError::MalformedTrace {
                            index,
                            reason: e.to_string(),
                        })
                    })
                    .collect()
            }
            TraceInput::CpuProfile(value) => {
                let profile: CpuProfile = serde_json::from_value(value.clone())?;
                debug!(
                    "Converting CPU profile: {} nodes, {} samples",
                    profile.nodes.len(),
                    profile.samples.len()
                );
                Ok(profile_to_trace_events(&profile, PROFILE_PID, PROFILE_TID))
            }
        }
    }
}

/// Check every record has the fields its phase requires
///
/// **Public** - also used by the `validate` command
///
/// # Errors
/// * `ParseError::InvalidFormat` - Empty event list
/// * `ParseError::MalformedTrace` - Position and reason of the first bad record
pub fn validate_event_list(events: &[Value]) -> Result<(), ParseError> {
    if events.is_empty() {
        return Err(ParseError::InvalidFormat("trace contains no events".to_string()));
    }

    for (index, event) in events.iter().enumerate() {
        let malformed = |reason: &str| ParseError::MalformedTrace {
            index,
            reason: reason.to_string(),
        };

        let Some(obj) = event.as_object() else {
            return Err(malformed("record is not an object"));
        };

        let Some(ph) = obj.get("ph").and_then(Value::as_str) else {
            return Err(malformed("missing phase 'ph'"));
        };

        if Phase::from_code(ph).requires_timestamp() && !obj.get("ts").map(Value::is_number).unwrap_or(false) {
            return Err(malformed(&format!("phase '{}' requires a numeric 'ts'", ph)));
        }
    }

    Ok(())
}

/// Parse any accepted input shape into raw records
///
/// # Example
/// ```ignore
/// let raw = parse_trace_events(&serde_json::from_str(&text)?)?;
/// ```
pub fn parse_trace_events(raw: &Value) -> Result<Vec<RawEvent>, ParseError> {
    TraceInput::detect(raw)?.into_raw_events()
}

/// Parse and ingest a trace in one step
///
/// **Public** - main entry point for the event model
///
/// # Arguments
/// * `raw` - Parsed JSON document in any accepted shape
/// * `storage` - Destination for large payloads
///
/// # Errors
/// Any [`ParseError`] from detection or validation. No partial model is
/// produced.
pub fn import_trace(
    raw: &Value,
    storage: Box<dyn BackingStorage + Send>,
) -> Result<TracingModel, ParseError> {
    let events = parse_trace_events(raw)?;
    debug!("Importing {} trace records", events.len());
    Ok(TracingModel::build(&events, storage))
}
