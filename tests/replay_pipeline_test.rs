//! Replay pipeline tests against an in-memory transport.
//!
//! Covers batching boundaries, skip-vs-abort error policy and the
//! connection lifecycle on every exit path.

use otreplay_lib::core::{shutdown_channel, Config, ConfigBuilder, ReplayError, Shutdown};
use otreplay_lib::Replayer;
use pretty_assertions::assert_eq;
use std::time::Duration;

mod common;
use common::*;

fn config() -> Config {
    Config::default()
}

#[tokio::test]
async fn test_fifty_lines_make_one_full_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "traces.jsonl", &trace_lines("api", 50));

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let stats = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.batch_sizes(), vec![50]);
    assert_eq!(recorded.starts, 1);
    assert_eq!(recorded.stops, 1);
    assert_eq!(stats.batches_sent, 1);
    assert_eq!(stats.records, 50);
}

#[tokio::test]
async fn test_fifty_one_lines_make_full_and_trailing_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "traces.jsonl", &trace_lines("api", 51));

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.batch_sizes(), vec![50, 1]);
    assert_eq!(recorded.span_names(), names("api", 51));
}

#[tokio::test]
async fn test_malformed_lines_are_skipped_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let good = trace_lines("web", 4);
    let lines = vec![
        good[0].clone(),
        "{not json".to_string(),
        good[1].clone(),
        String::new(),
        good[2].clone(),
        "[1, 2, 3]".to_string(),
        good[3].clone(),
    ];
    write_trace_file(dir.path(), "mixed.jsonl", &lines);

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let stats = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    assert_eq!(recorded.lock().unwrap().span_names(), names("web", 4));
    assert_eq!(stats.records, 4);
    assert_eq!(stats.lines_skipped, 3);
}

#[tokio::test]
async fn test_protobuf_json_spellings_are_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let lines = vec![
        r#"{"resource":{"attributes":[{"key":"service.name","value":{"stringValue":"legacy"}}]},"scopeSpans":[{"spans":[{"traceId":"AQEBAQEBAQEBAQEBAQEBAQ==","spanId":"AAAAAAAAAAE=","name":"legacy-op-0","kind":"SPAN_KIND_SERVER","startTimeUnixNano":"1700000000000000000","endTimeUnixNano":"1700000000050000000","status":{"code":"STATUS_CODE_OK"}}]}]}"#.to_string(),
        r#"{"resource":{"attributes":[{"key":"service.name","value":{"stringValue":"legacy"}}]},"scope_spans":[{"spans":[{"trace_id":"AQEBAQEBAQEBAQEBAQEBAQ==","span_id":"AAAAAAAAAAI=","parent_span_id":"AAAAAAAAAAE=","name":"legacy-op-1","kind":"SPAN_KIND_CLIENT","start_time_unix_nano":1700000000000000000,"end_time_unix_nano":1700000000050000000}]}]}"#.to_string(),
    ];
    write_trace_file(dir.path(), "legacy.json", &lines);

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let stats = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    assert_eq!(stats.records, 2);
    assert_eq!(stats.lines_skipped, 0);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.span_names(), names("legacy", 2));
    let spans: Vec<_> = recorded.batches[0]
        .iter()
        .map(|r| r.scope_spans[0].spans[0].clone())
        .collect();
    assert_eq!(spans[0].trace_id, vec![1; 16]);
    assert_eq!(spans[0].span_id, 1u64.to_be_bytes().to_vec());
    assert_eq!(spans[0].kind, 2);
    assert_eq!(spans[0].status.as_ref().map(|s| s.code), Some(1));
    assert_eq!(spans[1].parent_span_id, spans[0].span_id);
    assert_eq!(spans[1].kind, 3);
    assert_eq!(spans[1].start_time_unix_nano, 1_700_000_000_000_000_000);
}

#[tokio::test]
async fn test_file_of_only_malformed_lines_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(
        dir.path(),
        "junk.log",
        &["garbage".to_string(), "{\"resourceSpans\": oops}".to_string()],
    );

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let stats = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    assert!(recorded.batches.is_empty());
    assert_eq!(recorded.stops, 1);
    assert_eq!(stats.files_scanned, 1);
    assert_eq!(stats.lines_skipped, 2);
}

#[tokio::test]
async fn test_batches_never_span_files() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "a.jsonl", &trace_lines("a", 30));
    write_trace_file(dir.path(), "nested/b.jsonl", &trace_lines("b", 30));
    write_trace_file(dir.path(), "c.jsonl", &trace_lines("c", 70));

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let stats = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    // Walk order is by name: a.jsonl, c.jsonl, nested/b.jsonl
    assert_eq!(recorded.batch_sizes(), vec![30, 50, 20, 30]);
    let expected: Vec<String> = names("a", 30)
        .into_iter()
        .chain(names("c", 70))
        .chain(names("b", 30))
        .collect();
    assert_eq!(recorded.span_names(), expected);
    assert!(recorded.batches.iter().all(|b| (1..=50).contains(&b.len())));
    assert_eq!(stats.files_scanned, 3);
    assert_eq!(stats.spans_sent, 130);
}

#[tokio::test]
async fn test_configured_batch_size() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "t.jsonl", &trace_lines("svc", 25));

    let config = ConfigBuilder::new().batch_size(10).build().unwrap();
    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    Replayer::new(&config)
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    assert_eq!(recorded.lock().unwrap().batch_sizes(), vec![10, 10, 5]);
}

#[tokio::test]
async fn test_start_failure_aborts_before_any_upload() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "t.jsonl", &trace_lines("svc", 5));

    let transport = RecordingTransport {
        fail_start: true,
        ..Default::default()
    };
    let recorded = transport.handle();
    let err = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::ConnectionStart(_)));
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.starts, 1);
    assert_eq!(recorded.upload_attempts, 0);
    assert_eq!(recorded.stops, 0);
}

#[tokio::test]
async fn test_start_deadline() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "t.jsonl", &trace_lines("svc", 5));

    let config = ConfigBuilder::new()
        .connect_timeout(Duration::from_millis(30))
        .build()
        .unwrap();
    let transport = RecordingTransport {
        hang_start: true,
        ..Default::default()
    };
    let recorded = transport.handle();
    let err = Replayer::new(&config)
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::StartTimeout { timeout_ms: 30 }));
    assert_eq!(recorded.lock().unwrap().upload_attempts, 0);
}

#[tokio::test]
async fn test_failed_send_stops_run_and_still_closes() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "a.jsonl", &trace_lines("a", 60));
    write_trace_file(dir.path(), "b.jsonl", &trace_lines("b", 10));

    let transport = RecordingTransport {
        fail_upload_at: Some(2),
        ..Default::default()
    };
    let recorded = transport.handle();
    let err = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::Transmission { batch: 2, .. }));
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.batch_sizes(), vec![50]);
    // b.jsonl is never attempted
    assert_eq!(recorded.upload_attempts, 2);
    assert_eq!(recorded.stops, 1);
}

#[tokio::test]
async fn test_send_failure_wins_over_stop_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "a.jsonl", &trace_lines("a", 3));

    let transport = RecordingTransport {
        fail_upload_at: Some(1),
        fail_stop: true,
        ..Default::default()
    };
    let recorded = transport.handle();
    let err = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::Transmission { batch: 1, .. }));
    assert_eq!(recorded.lock().unwrap().stops, 1);
}

#[tokio::test]
async fn test_stop_failure_is_fatal_on_its_own() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "a.jsonl", &trace_lines("a", 3));

    let transport = RecordingTransport {
        fail_stop: true,
        ..Default::default()
    };
    let recorded = transport.handle();
    let err = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::ConnectionStop(_)));
    assert_eq!(recorded.lock().unwrap().batch_sizes(), vec![3]);
}

#[tokio::test]
async fn test_missing_root_is_fatal_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not-there");

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let err = Replayer::new(&config())
        .run(&missing, transport, Shutdown::never())
        .await
        .unwrap_err();

    match err {
        ReplayError::Walk { root, .. } => assert_eq!(root, missing),
        other => panic!("expected walk error, got {}", other),
    }
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.upload_attempts, 0);
    assert_eq!(recorded.stops, 1);
}

#[tokio::test]
async fn test_oversized_line_flushes_then_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = trace_lines("a", 3);
    let longest = lines.iter().map(String::len).max().unwrap();
    lines.push("x".repeat(longest + 10));
    lines.extend(trace_lines("late", 2));
    write_trace_file(dir.path(), "a.jsonl", &lines);
    write_trace_file(dir.path(), "b.jsonl", &trace_lines("b", 2));

    let config = ConfigBuilder::new().max_line_bytes(longest).build().unwrap();
    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let err = Replayer::new(&config)
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap_err();

    match err {
        ReplayError::Read { path, .. } => assert_eq!(path, dir.path().join("a.jsonl")),
        other => panic!("expected read error, got {}", other),
    }
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.span_names(), names("a", 3));
    assert_eq!(recorded.stops, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "a-locked.jsonl", &trace_lines("locked", 5));
    write_trace_file(dir.path(), "b-good.jsonl", &trace_lines("good", 5));
    let locked = dir.path().join("a-locked.jsonl");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    if std::fs::File::open(&locked).is_ok() {
        // Running with privileges that ignore file modes.
        eprintln!("skipping: file permissions are not enforced for this user");
        return;
    }

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let stats = Replayer::new(&config())
        .run(dir.path(), transport, Shutdown::never())
        .await
        .unwrap();

    assert_eq!(recorded.lock().unwrap().span_names(), names("good", 5));
    assert_eq!(stats.files_skipped, 1);
    assert_eq!(stats.files_scanned, 1);
}

#[tokio::test]
async fn test_cancelled_run_uploads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_trace_file(dir.path(), "a.jsonl", &trace_lines("a", 5));

    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger();

    let transport = RecordingTransport::new();
    let recorded = transport.handle();
    let err = Replayer::new(&config())
        .run(dir.path(), transport, shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, ReplayError::Cancelled));
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.upload_attempts, 0);
}
