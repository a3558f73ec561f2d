//! Nesting-aware traversal of a thread timeline.
//!
//! Events must be sorted by (start, ordinal). Duration events open a nesting
//! level and are closed once a later event starts at or after their end.
//! Zero-duration events are reported as instants with the innermost open
//! event as parent. Async events are skipped.

use super::event::TraceEvent;
use super::tracing_model::is_top_level_event;

/// Callbacks driven by [`walk_events`]
pub trait TimelineVisitor {
    fn on_start(&mut self, event: &TraceEvent);

    fn on_end(&mut self, event: &TraceEvent);

    fn on_instant(&mut self, event: &TraceEvent, parent: Option<&TraceEvent>);
}

/// Walk `events` in order, reporting nesting to `visitor`
///
/// **Public** - shared by stack reconstruction and category series
///
/// # Arguments
/// * `events` - Timeline sorted by (start, ordinal)
/// * `visitor` - Receives start/end/instant callbacks
/// * `start_time` - Events ending before this are skipped
/// * `end_time` - Events starting at or after this stop the walk
///
/// # Algorithm
/// 1. Jump back to the last top-level event starting at or before `start_time`
/// 2. Close open events whose end is at or before the next event's start
/// 3. Open duration events, report the rest as instants
/// 4. Close whatever is still open
pub fn walk_events<V: TimelineVisitor + ?Sized>(
    events: &[TraceEvent],
    visitor: &mut V,
    start_time: f64,
    end_time: f64,
) {
    let mut open: Vec<&TraceEvent> = Vec::new();

    for event in &events[top_level_event_ending_after(events, start_time)..] {
        if event.end_or_start() < start_time {
            continue;
        }
        if event.start_time >= end_time {
            break;
        }
        if event.phase.is_async() {
            continue;
        }

        while let Some(last) = open.last() {
            if last.end_or_start() > event.start_time {
                break;
            }
            visitor.on_end(last);
            open.pop();
        }

        if event.has_duration() {
            visitor.on_start(event);
            open.push(event);
        } else {
            visitor.on_instant(event, open.last().copied());
        }
    }

    while let Some(last) = open.pop() {
        visitor.on_end(last);
    }
}

/// Index to start a walk from so that events enclosing `time` are opened
fn top_level_event_ending_after(events: &[TraceEvent], time: f64) -> usize {
    let upper = events.partition_point(|event| event.start_time <= time);
    let mut index = upper.saturating_sub(1);
    while index > 0 && !is_top_level_event(&events[index]) {
        index -= 1;
    }
    index
}
