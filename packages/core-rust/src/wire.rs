//! Wire envelope and the bundled codecs.
//!
//! A reply body is either `{"status": "success", "body": {...}}` or
//! `{"status": "error", "exception_name": ..., "message": ...}`. Request
//! bodies are the bare field map.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::traits::WireCodec;
use crate::types::{Fields, Value};

/// Reply envelope exchanged between service and client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WireResponse {
    Success {
        body: Fields,
    },
    Error {
        exception_name: String,
        message: String,
    },
}

impl WireResponse {
    #[must_use]
    pub fn error(exception_name: impl Into<String>, message: impl Into<String>) -> Self {
        WireResponse::Error {
            exception_name: exception_name.into(),
            message: message.into(),
        }
    }
}

fn malformed(e: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::MalformedBody {
        reason: e.to_string(),
    }
}

fn has_non_finite(value: &Value) -> bool {
    match value {
        Value::Float(f) => !f.is_finite(),
        Value::Array(items) => items.iter().any(has_non_finite),
        Value::Map(entries) => entries.values().any(has_non_finite),
        _ => false,
    }
}

/// JSON has no spelling for `NaN` or the infinities; `serde_json` would
/// write them as `null`.
fn ensure_finite(fields: &Fields) -> Result<(), ProtocolError> {
    match fields.iter().find(|(_, value)| has_non_finite(value)) {
        Some((name, _)) => Err(ProtocolError::MalformedBody {
            reason: format!("field `{name}` holds a non-finite float"),
        }),
        None => Ok(()),
    }
}

/// JSON bodies via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Bytes, ProtocolError> {
        ensure_finite(fields)?;
        serde_json::to_vec(fields).map(Bytes::from).map_err(malformed)
    }

    fn decode_fields(&self, body: &[u8]) -> Result<Fields, ProtocolError> {
        if body.is_empty() {
            return Ok(Fields::new());
        }
        serde_json::from_slice(body).map_err(malformed)
    }

    fn encode_response(&self, response: &WireResponse) -> Result<Bytes, ProtocolError> {
        if let WireResponse::Success { body } = response {
            ensure_finite(body)?;
        }
        serde_json::to_vec(response).map(Bytes::from).map_err(malformed)
    }

    fn decode_response(&self, body: &[u8]) -> Result<WireResponse, ProtocolError> {
        serde_json::from_slice(body).map_err(malformed)
    }
}

/// `MsgPack` bodies via `rmp-serde`, using named (map) encoding for structs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl WireCodec for MsgPackCodec {
    fn content_type(&self) -> &'static str {
        "application/msgpack"
    }

    fn encode_fields(&self, fields: &Fields) -> Result<Bytes, ProtocolError> {
        rmp_serde::to_vec_named(fields)
            .map(Bytes::from)
            .map_err(malformed)
    }

    fn decode_fields(&self, body: &[u8]) -> Result<Fields, ProtocolError> {
        if body.is_empty() {
            return Ok(Fields::new());
        }
        rmp_serde::from_slice(body).map_err(malformed)
    }

    fn encode_response(&self, response: &WireResponse) -> Result<Bytes, ProtocolError> {
        rmp_serde::to_vec_named(response)
            .map(Bytes::from)
            .map_err(malformed)
    }

    fn decode_response(&self, body: &[u8]) -> Result<WireResponse, ProtocolError> {
        rmp_serde::from_slice(body).map_err(malformed)
    }
}
