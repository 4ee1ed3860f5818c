//! Common test utilities and fixtures.

#![allow(dead_code)]

use opentelemetry_proto::tonic::{
    common::v1::{any_value, AnyValue, KeyValue},
    resource::v1::Resource,
    trace::v1::{ResourceSpans, ScopeSpans, Span},
};
use otreplay_lib::core::{TraceRecord, TransportError};
use otreplay_lib::transport::TraceTransport;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A record whose span name identifies where it came from.
pub fn record(service: &str, index: usize) -> ResourceSpans {
    ResourceSpans {
        resource: Some(Resource {
            attributes: vec![KeyValue {
                key: "service.name".to_string(),
                value: Some(AnyValue {
                    value: Some(any_value::Value::StringValue(service.to_string())),
                }),
            }],
            dropped_attributes_count: 0,
        }),
        scope_spans: vec![ScopeSpans {
            spans: vec![Span {
                trace_id: vec![1; 16],
                span_id: (index as u64 + 1).to_be_bytes().to_vec(),
                name: format!("{}-op-{}", service, index),
                start_time_unix_nano: 1_700_000_000_000_000_000,
                end_time_unix_nano: 1_700_000_000_050_000_000,
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Span name of the single span in a fixture record.
pub fn span_name(record: &TraceRecord) -> String {
    record.scope_spans[0].spans[0].name.clone()
}

/// Expected span names for `count` records of `service`.
pub fn names(service: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}-op-{}", service, i)).collect()
}

/// Serialize `count` records for `service`, one per line.
pub fn trace_lines(service: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| serde_json::to_string(&record(service, i)).unwrap())
        .collect()
}

/// Write lines to `dir/name`, newline terminated.
pub fn write_trace_file(dir: &Path, name: &str, lines: &[String]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content).unwrap();
}

/// What a [`RecordingTransport`] saw.
#[derive(Debug, Default)]
pub struct Recorded {
    pub starts: usize,
    pub batches: Vec<Vec<TraceRecord>>,
    pub upload_attempts: usize,
    pub stops: usize,
}

impl Recorded {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(Vec::len).collect()
    }

    pub fn span_names(&self) -> Vec<String> {
        self.batches.iter().flatten().map(span_name).collect()
    }
}

/// In-memory transport that records every call.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub recorded: Arc<Mutex<Recorded>>,
    pub fail_start: bool,
    pub hang_start: bool,
    /// 1-based upload attempt that fails
    pub fail_upload_at: Option<usize>,
    pub fail_stop: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Mutex<Recorded>> {
        Arc::clone(&self.recorded)
    }
}

#[async_trait::async_trait]
impl TraceTransport for RecordingTransport {
    async fn start(&mut self, _deadline: Duration) -> Result<(), TransportError> {
        self.recorded.lock().unwrap().starts += 1;
        if self.hang_start {
            std::future::pending::<()>().await;
        }
        if self.fail_start {
            return Err(TransportError::Grpc(tonic::Status::unavailable("connection refused")));
        }
        Ok(())
    }

    async fn upload(&mut self, records: Vec<TraceRecord>) -> Result<(), TransportError> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.upload_attempts += 1;
        if self.fail_upload_at == Some(recorded.upload_attempts) {
            return Err(TransportError::Grpc(tonic::Status::unavailable("collector down")));
        }
        recorded.batches.push(records);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        self.recorded.lock().unwrap().stops += 1;
        if self.fail_stop {
            return Err(TransportError::Grpc(tonic::Status::internal("stop failed")));
        }
        Ok(())
    }
}
