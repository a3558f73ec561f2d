//! Group layout shifts into session clusters.
//!
//! A cluster closes once the next shift comes more than `gap_ms` after the
//! previous one or more than `span_ms` after the cluster's first shift.
//! Every member is stamped with the final cluster id and score, which are
//! only known once the cluster closes.

use crate::model::event::TraceEvent;
use crate::utils::config::{AnalysisConfig, LAYOUT_SHIFT};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Cluster id key stamped into `args.data`
pub const CLUSTER_ID_KEY: &str = "_current_cluster_id";

/// Cluster score key stamped into `args.data`
pub const CLUSTER_SCORE_KEY: &str = "_current_cluster_score";

/// One finished cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutShiftCluster {
    /// 0-based, in order of formation
    pub id: usize,
    pub score: f64,
    pub start_time: f64,
    pub end_time: f64,

    /// Ordinals of member events
    pub members: Vec<u64>,
}

/// Gap and span limits in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterThresholds {
    pub gap_ms: f64,
    pub span_ms: f64,
}

impl ClusterThresholds {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            gap_ms: config.layout_shift_gap_ms,
            span_ms: config.layout_shift_span_ms,
        }
    }
}

enum ClusterState {
    Idle,
    Accumulating {
        first_time: f64,
        previous_time: f64,
        score: f64,
        members: Vec<usize>,
    },
}

/// Score of a shift, or `None` if it must be skipped
fn shift_score(event: &TraceEvent) -> Option<f64> {
    let data = event.data()?;
    if data.get("had_recent_input").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    data.get("weighted_score_delta").and_then(Value::as_f64)
}

/// Clone the layout shift events out of a timeline
pub fn collect_layout_shifts(events: &[TraceEvent]) -> Vec<TraceEvent> {
    events.iter().filter(|e| e.name == LAYOUT_SHIFT).cloned().collect()
}

/// Assign layout shifts to clusters and stamp each member
///
/// **Public** - cluster assigner entry point
///
/// # Arguments
/// * `shifts` - Layout shift events, any order; sorted in place by (start, ordinal)
/// * `thresholds` - Gap and span limits
///
/// # Returns
/// Closed clusters in order. Shifts after recent input or without a score
/// are left untouched and belong to no cluster.
pub fn assign_layout_shifts_to_clusters(
    shifts: &mut [TraceEvent],
    thresholds: ClusterThresholds,
) -> Vec<LayoutShiftCluster> {
    shifts.sort_by(|a, b| a.precedes(b));

    let mut clusters = Vec::new();
    let mut state = ClusterState::Idle;

    for index in 0..shifts.len() {
        let Some(score) = shift_score(&shifts[index]) else {
            continue;
        };
        let time = shifts[index].start_time;

        state = match state {
            ClusterState::Accumulating {
                first_time,
                previous_time,
                score: total,
                mut members,
            } if time - first_time <= thresholds.span_ms && time - previous_time <= thresholds.gap_ms => {
                members.push(index);
                ClusterState::Accumulating {
                    first_time,
                    previous_time: time,
                    score: total + score,
                    members,
                }
            }
            previous => {
                if let ClusterState::Accumulating { score, members, .. } = previous {
                    clusters.push(close_cluster(shifts, clusters.len(), score, &members));
                }
                ClusterState::Accumulating {
                    first_time: time,
                    previous_time: time,
                    score,
                    members: vec![index],
                }
            }
        };
    }

    if let ClusterState::Accumulating { score, members, .. } = state {
        clusters.push(close_cluster(shifts, clusters.len(), score, &members));
    }

    debug!(
        "Assigned {} layout shifts to {} clusters",
        shifts.len(),
        clusters.len()
    );

    clusters
}

fn close_cluster(shifts: &mut [TraceEvent], id: usize, score: f64, members: &[usize]) -> LayoutShiftCluster {
    for &index in members {
        stamp(&mut shifts[index], id, score);
    }

    LayoutShiftCluster {
        id,
        score,
        start_time: members.first().map(|&i| shifts[i].start_time).unwrap_or(0.0),
        end_time: members.last().map(|&i| shifts[i].start_time).unwrap_or(0.0),
        members: members.iter().map(|&i| shifts[i].ordinal).collect(),
    }
}

fn stamp(event: &mut TraceEvent, id: usize, score: f64) {
    if !event.args.is_object() {
        event.args = Value::Object(Map::new());
    }
    let Some(args) = event.args.as_object_mut() else {
        return;
    };
    let data = args.entry("data").or_insert_with(|| json!({}));
    if let Some(data) = data.as_object_mut() {
        data.insert(CLUSTER_ID_KEY.to_string(), json!(id));
        data.insert(CLUSTER_SCORE_KEY.to_string(), json!(score));
    }
}
