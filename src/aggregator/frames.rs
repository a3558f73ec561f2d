//! Partition a main-thread timeline into rendering frames.

use crate::model::event::TraceEvent;
use crate::utils::config::AnalysisConfig;
use log::debug;
use serde::{Deserialize, Serialize};

/// One vsync-to-vsync interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderingFrame {
    pub start_time: f64,
    pub duration: f64,

    /// Self time of events inside the interval
    pub cpu_time: f64,

    /// No draw or commit was observed before the next boundary
    pub dropped: bool,
}

impl RenderingFrame {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Event names that drive frame detection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameMarkers {
    pub boundaries: Vec<String>,
    pub draw_signals: Vec<String>,
    pub dropped: Vec<String>,
}

impl FrameMarkers {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            boundaries: config.frame_boundary_markers.clone(),
            draw_signals: config.frame_draw_signals.clone(),
            dropped: config.dropped_frame_markers.clone(),
        }
    }

    fn is_boundary(&self, event: &TraceEvent) -> bool {
        self.boundaries.iter().any(|name| *name == event.name)
    }

    fn is_draw(&self, event: &TraceEvent) -> bool {
        self.draw_signals.iter().any(|name| *name == event.name)
    }

    fn is_dropped(&self, event: &TraceEvent) -> bool {
        self.dropped.iter().any(|name| *name == event.name)
    }
}

/// Frame under construction
struct OpenFrame {
    start_time: f64,
    drawn: bool,
    forced_dropped: bool,
}

impl OpenFrame {
    fn close(self, end_time: f64) -> RenderingFrame {
        RenderingFrame {
            start_time: self.start_time,
            duration: (end_time - self.start_time).max(0.0),
            cpu_time: 0.0,
            dropped: self.forced_dropped || !self.drawn,
        }
    }
}

/// Build rendering frames from one thread's timeline
///
/// **Public** - main entry point for the frame model
///
/// # Arguments
/// * `events` - Thread timeline sorted by (start, ordinal), self times set
/// * `markers` - Boundary, draw and dropped marker names
/// * `start_time` - Events before this (the nominal trace start) are ignored
///
/// # Returns
/// Frames in time order. Every frame is kept, including the first; skipping
/// warm-up frames is left to the caller.
pub fn build_frames(events: &[TraceEvent], markers: &FrameMarkers, start_time: f64) -> Vec<RenderingFrame> {
    let mut frames = Vec::new();
    let mut current: Option<OpenFrame> = None;
    let mut trace_end = start_time;

    for event in events.iter().filter(|e| e.start_time >= start_time) {
        trace_end = trace_end.max(event.end_or_start());

        if markers.is_boundary(event) {
            if let Some(open) = current.take() {
                frames.push(open.close(event.start_time));
            }
            current = Some(OpenFrame {
                start_time: event.start_time,
                drawn: false,
                forced_dropped: false,
            });
            continue;
        }

        if let Some(open) = current.as_mut() {
            if markers.is_draw(event) {
                open.drawn = true;
            }
            if markers.is_dropped(event) {
                open.forced_dropped = true;
            }
        }
    }

    if let Some(open) = current.take() {
        frames.push(open.close(trace_end));
    }

    attribute_cpu_time(&mut frames, events);

    debug!(
        "Built {} frames ({} dropped)",
        frames.len(),
        frames.iter().filter(|f| f.dropped).count()
    );

    frames
}

/// Spread each duration event's self time over the frames it overlaps
fn attribute_cpu_time(frames: &mut [RenderingFrame], events: &[TraceEvent]) {
    if frames.is_empty() {
        return;
    }

    for event in events.iter().filter(|e| e.has_duration() && !e.phase.is_async()) {
        let (start, end) = (event.start_time, event.end_or_start());
        let duration = end - start;
        let first = frames.partition_point(|frame| frame.end_time() <= start);

        for frame in frames[first..].iter_mut() {
            if frame.start_time >= end {
                break;
            }
            let overlap = end.min(frame.end_time()) - start.max(frame.start_time);
            if overlap > 0.0 {
                frame.cpu_time += event.self_time * overlap / duration;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::{Phase, ThreadId};
    use crate::model::compute_self_times;

    const THREAD: ThreadId = ThreadId { pid: 1, tid: 1 };

    fn instant(name: &str, time: f64, ordinal: u64) -> TraceEvent {
        TraceEvent::new("devtools.timeline", name, Phase::Instant, time, THREAD).with_ordinal(ordinal)
    }

    fn complete(name: &str, start: f64, end: f64, ordinal: u64) -> TraceEvent {
        TraceEvent::new("devtools.timeline", name, Phase::Complete, start, THREAD)
            .with_end_time(end)
            .with_ordinal(ordinal)
    }

    fn markers() -> FrameMarkers {
        FrameMarkers::from_config(&AnalysisConfig::default())
    }

    #[test]
    fn test_frames_between_boundaries() {
        let mut events = vec![
            instant("BeginMainThreadFrame", 0.0, 1),
            complete("Layout", 2.0, 6.0, 2),
            instant("Commit", 7.0, 3),
            instant("BeginMainThreadFrame", 16.0, 4),
            complete("FunctionCall", 20.0, 40.0, 5),
        ];
        compute_self_times(&mut events);

        let frames = build_frames(&events, &markers(), 0.0);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].duration, 16.0);
        assert_eq!(frames[0].cpu_time, 4.0);
        assert!(!frames[0].dropped);

        // Last frame closes at the last event end, and no draw means dropped
        assert_eq!(frames[1].start_time, 16.0);
        assert_eq!(frames[1].duration, 24.0);
        assert_eq!(frames[1].cpu_time, 20.0);
        assert!(frames[1].dropped);
    }

    #[test]
    fn test_cpu_time_split_across_frames() {
        let mut events = vec![
            instant("BeginMainThreadFrame", 0.0, 1),
            complete("RunTask", 5.0, 15.0, 2),
            instant("BeginMainThreadFrame", 10.0, 3),
            instant("DrawFrame", 12.0, 4),
            instant("BeginMainThreadFrame", 20.0, 5),
        ];
        compute_self_times(&mut events);

        let frames = build_frames(&events, &markers(), 0.0);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].cpu_time, 5.0);
        assert_eq!(frames[1].cpu_time, 5.0);
        assert!(!frames[1].dropped);
        assert_eq!(frames[2].duration, 0.0);
    }

    #[test]
    fn test_explicit_dropped_marker_wins() {
        let events = vec![
            instant("BeginMainThreadFrame", 0.0, 1),
            instant("DrawFrame", 1.0, 2),
            instant("DroppedFrame", 2.0, 3),
            instant("BeginMainThreadFrame", 16.0, 4),
        ];

        let frames = build_frames(&events, &markers(), 0.0);
        assert!(frames[0].dropped);
    }

    #[test]
    fn test_events_before_start_ignored() {
        let events = vec![
            instant("BeginMainThreadFrame", 0.0, 1),
            instant("BeginMainThreadFrame", 10.0, 2),
            instant("DrawFrame", 12.0, 3),
            instant("BeginMainThreadFrame", 26.0, 4),
        ];

        let frames = build_frames(&events, &markers(), 5.0);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].start_time, 10.0);
    }

    #[test]
    fn test_no_boundaries_no_frames() {
        let events = vec![complete("RunTask", 0.0, 10.0, 1)];
        assert!(build_frames(&events, &markers(), 0.0).is_empty());
    }
}
