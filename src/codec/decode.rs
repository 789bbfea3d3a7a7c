//! Payload decoding and classification.
//!
//! Payload schema:
//!
//! ```text
//! { "sequence": int64, "timestamp": float64, "data": { ... } }
//! ```
//!
//! An empty `data` object is an application heartbeat. Anything that fails
//! to parse is reported as [`DecodeOutcome::Error`]; decoding never panics
//! and never returns early past this boundary.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::snapshot::{Snapshot, SnapshotData};
use crate::core::DecodeError;

/// Classification of one non-empty frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// A state update.
    Data(Snapshot),
    /// `data` was `{}`: the application is alive with nothing new.
    EmptyHeartbeat,
    /// The payload could not be decoded.
    Error(DecodeError),
}

impl DecodeOutcome {
    /// Whether this outcome proves the source is alive.
    pub fn is_liveness(&self) -> bool {
        !matches!(self, DecodeOutcome::Error(_))
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    sequence: i64,
    #[serde(default)]
    timestamp: f64,
    data: Option<Value>,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    sequence: i64,
    timestamp: f64,
    data: &'a SnapshotData,
}

/// Decode and classify a payload received at `receive_time`.
pub fn decode_payload(payload: &[u8], receive_time: Instant) -> DecodeOutcome {
    match decode(payload, receive_time) {
        Ok(Some(snapshot)) => DecodeOutcome::Data(snapshot),
        Ok(None) => DecodeOutcome::EmptyHeartbeat,
        Err(e) => DecodeOutcome::Error(e),
    }
}

fn decode(payload: &[u8], receive_time: Instant) -> Result<Option<Snapshot>, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
    let envelope: Envelope = serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;

    let data = match envelope.data {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => return Err(DecodeError::MissingData),
        Some(_) => return Err(DecodeError::DataNotObject),
    };
    if data.is_empty() {
        return Ok(None);
    }

    let data: SnapshotData =
        serde_json::from_value(Value::Object(data)).map_err(|e| DecodeError::Json(e.to_string()))?;

    Ok(Some(Snapshot {
        sequence: envelope.sequence,
        source_timestamp: envelope.timestamp,
        receive_time,
        data,
    }))
}

/// Serialize a payload in the source's schema.
///
/// An empty [`SnapshotData`] serializes as `{}` and is therefore received
/// as an application heartbeat.
pub fn encode_payload(sequence: i64, timestamp: f64, data: &SnapshotData) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&OutboundEnvelope {
        sequence,
        timestamp,
        data,
    })
}

/// Serialize an application heartbeat payload.
pub fn application_heartbeat_payload(sequence: i64, timestamp: f64) -> serde_json::Result<Vec<u8>> {
    encode_payload(sequence, timestamp, &SnapshotData::default())
}
