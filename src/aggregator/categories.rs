//! Activity categories and the event-name table that assigns them.

use crate::model::event::TraceEvent;
use crate::model::tracing_model::has_category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Coarse activity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Loading,
    Experience,
    Scripting,
    Rendering,
    Painting,
    Gpu,
    Async,
    Other,
    Idle,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Loading,
        Category::Experience,
        Category::Scripting,
        Category::Rendering,
        Category::Painting,
        Category::Gpu,
        Category::Async,
        Category::Other,
        Category::Idle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Loading => "loading",
            Category::Experience => "experience",
            Category::Scripting => "scripting",
            Category::Rendering => "rendering",
            Category::Painting => "painting",
            Category::Gpu => "gpu",
            Category::Async => "async",
            Category::Other => "other",
            Category::Idle => "idle",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Trace categories whose events are always script work
const SCRIPTING_TRACE_CATEGORIES: &[&str] = &["blink.console", "blink.user_timing", "latencyInfo"];

const NAMED_EVENTS: &[(&str, Category)] = &[
    ("RunTask", Category::Other),
    ("Program", Category::Other),
    ("Animation", Category::Rendering),
    ("BeginFrame", Category::Rendering),
    ("BeginMainThreadFrame", Category::Rendering),
    ("DrawFrame", Category::Rendering),
    ("RequestMainThreadFrame", Category::Rendering),
    ("HitTest", Category::Rendering),
    ("ScheduleStyleRecalculation", Category::Rendering),
    ("RecalculateStyles", Category::Rendering),
    ("UpdateLayoutTree", Category::Rendering),
    ("InvalidateLayout", Category::Rendering),
    ("Layout", Category::Rendering),
    ("UpdateLayerTree", Category::Rendering),
    ("ScrollLayer", Category::Rendering),
    ("IntersectionObserverController::computeIntersections", Category::Rendering),
    ("firstContentfulPaint", Category::Rendering),
    ("largestContentfulPaint::Candidate", Category::Rendering),
    ("PaintSetup", Category::Painting),
    ("PaintImage", Category::Painting),
    ("UpdateLayer", Category::Painting),
    ("Paint", Category::Painting),
    ("RasterTask", Category::Painting),
    ("CompositeLayers", Category::Painting),
    ("Decode Image", Category::Painting),
    ("Resize Image", Category::Painting),
    ("firstPaint", Category::Painting),
    ("ParseHTML", Category::Loading),
    ("ParseAuthorStyleSheet", Category::Loading),
    ("ResourceWillSendRequest", Category::Loading),
    ("ResourceSendRequest", Category::Loading),
    ("ResourceReceiveResponse", Category::Loading),
    ("ResourceReceivedData", Category::Loading),
    ("ResourceFinish", Category::Loading),
    ("FrameStartedLoading", Category::Loading),
    ("EventDispatch", Category::Scripting),
    ("TimerInstall", Category::Scripting),
    ("TimerRemove", Category::Scripting),
    ("TimerFire", Category::Scripting),
    ("XHRReadyStateChange", Category::Scripting),
    ("XHRLoad", Category::Scripting),
    ("v8.compile", Category::Scripting),
    ("V8.CompileCode", Category::Scripting),
    ("V8.OptimizeCode", Category::Scripting),
    ("v8.produceCache", Category::Scripting),
    ("v8.compileModule", Category::Scripting),
    ("v8.produceModuleCache", Category::Scripting),
    ("EvaluateScript", Category::Scripting),
    ("v8.evaluateModule", Category::Scripting),
    ("v8.parseOnBackgroundParsing", Category::Scripting),
    ("v8.wasm.streamFromResponseCallback", Category::Scripting),
    ("v8.wasm.compiledModule", Category::Scripting),
    ("v8.wasm.cachedModule", Category::Scripting),
    ("v8.wasm.moduleCacheHit", Category::Scripting),
    ("v8.wasm.moduleCacheInvalid", Category::Scripting),
    ("MarkLoad", Category::Scripting),
    ("MarkDOMContent", Category::Scripting),
    ("TimeStamp", Category::Scripting),
    ("ConsoleTime", Category::Scripting),
    ("UserTiming", Category::Scripting),
    ("RunMicrotasks", Category::Scripting),
    ("FunctionCall", Category::Scripting),
    ("GCEvent", Category::Scripting),
    ("MajorGC", Category::Scripting),
    ("MinorGC", Category::Scripting),
    ("JSFrame", Category::Scripting),
    ("RequestAnimationFrame", Category::Scripting),
    ("CancelAnimationFrame", Category::Scripting),
    ("FireAnimationFrame", Category::Scripting),
    ("RequestIdleCallback", Category::Scripting),
    ("CancelIdleCallback", Category::Scripting),
    ("FireIdleCallback", Category::Scripting),
    ("WebSocketCreate", Category::Scripting),
    ("WebSocketSendHandshakeRequest", Category::Scripting),
    ("WebSocketReceiveHandshakeResponse", Category::Scripting),
    ("WebSocketDestroy", Category::Scripting),
    ("EmbedderCallback", Category::Scripting),
    ("LatencyInfo", Category::Scripting),
    ("BlinkGC.AtomicPhase", Category::Scripting),
    ("DoEncrypt", Category::Scripting),
    ("DoEncryptReply", Category::Scripting),
    ("DoDecrypt", Category::Scripting),
    ("DoDecryptReply", Category::Scripting),
    ("DoDigest", Category::Scripting),
    ("DoDigestReply", Category::Scripting),
    ("DoSign", Category::Scripting),
    ("DoSignReply", Category::Scripting),
    ("DoVerify", Category::Scripting),
    ("DoVerifyReply", Category::Scripting),
    ("v8.parseOnBackground", Category::Other),
    ("v8.parseOnBackgroundWaiting", Category::Idle),
    ("GPUTask", Category::Gpu),
    ("AsyncTask", Category::Async),
    ("LayoutShift", Category::Experience),
];

/// Immutable event name → category table
///
/// **Public** - build once per process and pass by reference
#[derive(Debug, Clone)]
pub struct CategoryTable {
    by_name: HashMap<&'static str, Category>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryTable {
    pub fn new() -> Self {
        Self {
            by_name: NAMED_EVENTS.iter().copied().collect(),
        }
    }

    /// Category of an event; unknown names are `Other`
    pub fn classify(&self, event: &TraceEvent) -> Category {
        if SCRIPTING_TRACE_CATEGORIES
            .iter()
            .any(|cat| has_category(&event.category, cat))
        {
            return Category::Scripting;
        }
        self.classify_name(&event.name)
    }

    pub fn classify_name(&self, name: &str) -> Category {
        self.by_name.get(name).copied().unwrap_or(Category::Other)
    }
}
