use pageperf_trace::model::{Phase, StackPayload, ThreadId, TracingModel};
use pageperf_trace::parser::{
    import_trace, parse_trace_events, InMemoryStorage, NullStorage, TraceInput,
};
use pageperf_trace::utils::error::{ParseError, ReconstructionAnomaly};
use pretty_assertions::assert_eq;
use serde_json::json;

fn import(raw: serde_json::Value) -> TracingModel {
    import_trace(&raw, Box::new(NullStorage)).unwrap()
}

#[test]
fn test_bare_list_and_envelope_agree() {
    let events = json!([
        {"ph": "X", "name": "RunTask", "cat": "toplevel", "ts": 1000, "dur": 4000, "pid": 3, "tid": 9},
        {"ph": "I", "name": "Commit", "ts": 2000, "pid": 3, "tid": 9}
    ]);
    let envelope = json!({"traceEvents": events.clone(), "metadata": {"source": "test"}});

    assert_eq!(
        parse_trace_events(&events).unwrap(),
        parse_trace_events(&envelope).unwrap()
    );
}

#[test]
fn test_unrecognised_shape_rejected() {
    assert!(matches!(
        TraceInput::detect(&json!({"foo": 1})),
        Err(ParseError::InvalidFormat(_))
    ));
    assert!(matches!(
        parse_trace_events(&json!([])),
        Err(ParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_first_bad_record_is_reported() {
    let raw = json!([
        {"ph": "X", "name": "RunTask", "ts": 0, "pid": 1, "tid": 1},
        "not an object",
        {"name": "NoPhase", "ts": 5}
    ]);

    match parse_trace_events(&raw) {
        Err(ParseError::MalformedTrace { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected MalformedTrace, got {:?}", other),
    }
}

#[test]
fn test_ingestion_converts_to_milliseconds_and_nests() {
    let model = import(json!([
        {"ph": "M", "name": "thread_name", "pid": 1, "tid": 2, "args": {"name": "CrRendererMain"}},
        {"ph": "M", "name": "process_name", "pid": 1, "args": {"name": "Renderer"}},
        {"ph": "B", "name": "ParseHTML", "ts": 1000, "pid": 1, "tid": 2},
        {"ph": "X", "name": "EvaluateScript", "ts": 1500, "dur": 2000, "pid": 1, "tid": 2},
        {"ph": "E", "name": "ParseHTML", "ts": 5000, "pid": 1, "tid": 2, "args": {"endData": {"line": 3}}}
    ]));

    let main = ThreadId::new(1, 2);
    assert_eq!(model.main_thread(), Some(main));
    assert_eq!(model.process_name(1), Some("Renderer"));

    let events = model.thread(main).unwrap().events();
    assert_eq!(events.len(), 2);

    let parse = &events[0];
    assert_eq!(parse.name, "ParseHTML");
    assert_eq!(parse.phase, Phase::Complete);
    assert_eq!((parse.start_time, parse.end_time), (1.0, Some(5.0)));
    assert_eq!(parse.self_time, 2.0);
    assert_eq!(parse.args["endData"]["line"], 3);

    assert_eq!(events[1].start_time, 1.5);
    assert_eq!(events[1].self_time, 2.0);
    assert!(model.anomalies().is_empty());
}

#[test]
fn test_unclosed_begin_closed_at_trace_end() {
    let model = import(json!([
        {"ph": "B", "name": "Layout", "ts": 1000, "pid": 1, "tid": 1},
        {"ph": "I", "name": "Commit", "ts": 9000, "pid": 1, "tid": 1}
    ]));

    let layout = &model.thread(ThreadId::new(1, 1)).unwrap().events()[0];
    assert_eq!(layout.end_time, Some(9.0));
    assert!(matches!(
        model.anomalies().entries(),
        [ReconstructionAnomaly::UnclosedBegin { .. }]
    ));
}

#[test]
fn test_async_spans_are_paired() {
    let model = import(json!([
        {"ph": "b", "name": "fetch", "cat": "net", "id": "0x1", "ts": 1000, "pid": 1, "tid": 1},
        {"ph": "n", "name": "fetch", "cat": "net", "id": "0x1", "ts": 2000, "pid": 1, "tid": 1, "args": {"step": "headers"}},
        {"ph": "e", "name": "fetch", "cat": "net", "id": "0x1", "ts": 7000, "pid": 1, "tid": 1}
    ]));

    let thread = model.thread(ThreadId::new(1, 1)).unwrap();
    assert!(thread.events().is_empty());
    assert_eq!(thread.async_events().len(), 1);

    let span = &thread.async_events()[0];
    assert_eq!((span.start_time, span.end_time), (1.0, Some(7.0)));
    assert_eq!(span.args["step"], "headers");
}

#[test]
fn test_snapshots_go_to_storage() {
    let raw = json!([
        {"ph": "O", "name": "LayerTree", "id": 17, "ts": 3000, "pid": 1, "tid": 1,
         "args": {"snapshot": {"layers": [1, 2, 3]}}}
    ]);
    let model = import_trace(&raw, Box::new(InMemoryStorage::new())).unwrap();

    let snapshot = &model.object_snapshots()[0];
    assert_eq!(snapshot.id.as_deref(), Some("17"));
    assert_eq!(snapshot.time, 3.0);
    assert_eq!(model.snapshot_payload(snapshot), Some(json!({"layers": [1, 2, 3]})));
}

#[test]
fn test_profile_chunks_become_samples() {
    let node = |id: u64, name: &str, parent: Option<u64>| {
        let mut node = json!({"id": id, "callFrame": {"functionName": name, "scriptId": 4, "url": "app.js", "lineNumber": id}});
        if let Some(parent) = parent {
            node["parent"] = json!(parent);
        }
        node
    };
    let model = import(json!([
        {"ph": "P", "name": "Profile", "id": "0x2", "ts": 10000, "pid": 1, "tid": 5,
         "args": {"data": {"startTime": 10000}}},
        {"ph": "P", "name": "ProfileChunk", "id": "0x2", "ts": 12000, "pid": 1, "tid": 6,
         "args": {"data": {
             "cpuProfile": {"nodes": [node(1, "(root)", None), node(2, "work", Some(1)), node(3, "(idle)", Some(1))],
                            "samples": [2, 3]},
             "timeDeltas": [100, 1000]}}},
        {"ph": "P", "name": "ProfileChunk", "id": "0x2", "ts": 14000, "pid": 1, "tid": 6,
         "args": {"data": {"cpuProfile": {"samples": [2, 99]}, "timeDeltas": [1000, 1000]}}}
    ]));

    // Samples land on the thread that emitted the Profile event
    let events = model.thread(ThreadId::new(1, 5)).unwrap().events();
    let samples: Vec<f64> = events
        .iter()
        .filter(|e| e.name == "JSSample")
        .map(|e| e.start_time)
        .collect();
    assert_eq!(samples, vec![10.0, 11.1]);

    let StackPayload::Sample(stack) = &events.iter().find(|e| e.name == "JSSample").unwrap().stack else {
        panic!("sample without stack");
    };
    assert_eq!(stack[0].function_name, "work");

    assert!(matches!(
        model.anomalies().entries(),
        [ReconstructionAnomaly::UnknownSampleNode { node_id: 99, .. }]
    ));
}
