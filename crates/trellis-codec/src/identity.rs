//! Canonical string form for identity-flagged values.
//!
//! The encoded string doubles as the exact-match secondary key for by-id
//! lookups, so the mapping must be stable and exactly reversible. Strings
//! pass through unchanged; every other kind, including composite record
//! identities, round-trips through a generic JSON rendering of the value.

use trellis_types::{FieldKind, ScalarKind, Value};

use crate::error::{CodecError, CodecResult};

/// Canonicalize an identity value into a comparable string.
pub fn encode_identity(value: &Value) -> CodecResult<String> {
    if let Value::String(s) = value {
        return Ok(s.to_string());
    }
    serde_json::to_string(value).map_err(|e| CodecError::Identity(e.to_string()))
}

/// Reverse [`encode_identity`] for a field of the given kind.
pub fn decode_identity(encoded: &str, kind: &FieldKind) -> CodecResult<Value> {
    if matches!(kind, FieldKind::Scalar(ScalarKind::String)) {
        return Ok(Value::from(encoded));
    }
    serde_json::from_str(encoded).map_err(|e| CodecError::Identity(e.to_string()))
}
