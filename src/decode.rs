//! Line decoding.
//!
//! Each line of a trace file is one OTLP/JSON `ResourceSpans` object, the
//! shape the collector's file exporter and protobuf JSON marshalers write.
//!
//! The generated serde types only understand one dialect of the protobuf
//! JSON mapping: hex ids, integer enums and 64-bit integers as strings.
//! [`JsonRecordDecoder`] parses into a [`Value`] first and rewrites the
//! other accepted spellings into that dialect:
//!
//! - ids (`traceId`, `spanId`, `parentSpanId`) as hex or base64
//! - `kind` and `status.code` as integers or enum names
//! - `*TimeUnixNano` as numbers or strings
//! - `bytesValue` as base64
//! - field names in `lowerCamelCase` or `snake_case`
//! - `null` meaning "field not set"

use crate::core::{DecodeError, TraceRecord};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use opentelemetry_proto::tonic::trace::v1::{span::SpanKind, status::StatusCode};
use serde::de::Error as _;
use serde_json::{Map, Value};

/// Turns one line of a trace file into a record.
pub trait RecordDecoder {
    /// Decode a single line, without its terminator. `line_no` is 1-based
    /// and only used for error reporting.
    fn decode(&self, line_no: u64, line: &[u8]) -> Result<TraceRecord, DecodeError>;
}

/// Decodes OTLP/JSON in any of the protobuf JSON mapping's spellings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordDecoder;

impl RecordDecoder for JsonRecordDecoder {
    fn decode(&self, line_no: u64, line: &[u8]) -> Result<TraceRecord, DecodeError> {
        let wrap = |source| DecodeError {
            line: line_no,
            source,
        };

        let mut value: Value = serde_json::from_slice(line).map_err(wrap)?;
        if !value.is_object() {
            return Err(wrap(serde_json::Error::custom(
                "expected a ResourceSpans object",
            )));
        }
        normalize(&mut value).map_err(|msg| wrap(serde_json::Error::custom(msg)))?;
        serde_json::from_value(value).map_err(wrap)
    }
}

fn normalize(value: &mut Value) -> Result<(), String> {
    match value {
        Value::Object(map) => normalize_object(map),
        Value::Array(items) => items.iter_mut().try_for_each(normalize),
        _ => Ok(()),
    }
}

fn normalize_object(map: &mut Map<String, Value>) -> Result<(), String> {
    map.retain(|_, v| !v.is_null());

    let snake: Vec<String> = map.keys().filter(|k| k.contains('_')).cloned().collect();
    for key in snake {
        let camel = to_lower_camel(&key);
        if let Some(v) = map.remove(&key) {
            map.entry(camel).or_insert(v);
        }
    }

    for (key, v) in map.iter_mut() {
        match key.as_str() {
            "traceId" | "spanId" | "parentSpanId" => normalize_id(key, v)?,
            "startTimeUnixNano" | "endTimeUnixNano" | "timeUnixNano" => number_to_string(v),
            "flags" | "droppedAttributesCount" | "droppedEventsCount" | "droppedLinksCount" => {
                string_to_number(key, v)?
            },
            "kind" => enum_name_to_number(v, |name| {
                SpanKind::from_str_name(name).map(|k| k as i32)
            })?,
            "code" => enum_name_to_number(v, |name| {
                StatusCode::from_str_name(name).map(|c| c as i32)
            })?,
            "bytesValue" => base64_to_bytes(v)?,
            _ => normalize(v)?,
        }
    }
    Ok(())
}

fn to_lower_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn decode_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(s).or_else(|_| URL_SAFE.decode(s))
}

/// Ids stay hex; anything else must be base64 and is re-encoded as hex.
fn normalize_id(key: &str, v: &mut Value) -> Result<(), String> {
    if let Value::String(s) = v {
        if s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(());
        }
        let bytes = decode_base64(s).map_err(|e| format!("invalid {}: {}", key, e))?;
        *s = hex::encode(bytes);
    }
    Ok(())
}

fn number_to_string(v: &mut Value) {
    if let Value::Number(n) = v {
        *v = Value::String(n.to_string());
    }
}

fn string_to_number(key: &str, v: &mut Value) -> Result<(), String> {
    if let Value::String(s) = v {
        let n: u32 = s
            .parse()
            .map_err(|e| format!("invalid {} {:?}: {}", key, s, e))?;
        *v = Value::from(n);
    }
    Ok(())
}

fn enum_name_to_number(v: &mut Value, lookup: impl Fn(&str) -> Option<i32>) -> Result<(), String> {
    if let Value::String(name) = v {
        let n = lookup(name.as_str()).ok_or_else(|| format!("unknown enum value {:?}", name))?;
        *v = Value::from(n);
    }
    Ok(())
}

fn base64_to_bytes(v: &mut Value) -> Result<(), String> {
    if let Value::String(s) = v {
        let bytes = decode_base64(s).map_err(|e| format!("invalid bytesValue: {}", e))?;
        *v = Value::Array(bytes.into_iter().map(Value::from).collect());
    }
    Ok(())
}
