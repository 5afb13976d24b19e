//! Raw provisioning state and its persisted envelope
//!
//! A persisted state blob looks like
//! `{"data": "<payload>", "encoding": "base64"}`. This module is the only
//! place that knows about that envelope; everything else passes
//! [`RawState`] around as opaque bytes.

use crate::error::DecodeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Provisioning engine state as an opaque byte sequence
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawState {
    data: Vec<u8>,
}

impl RawState {
    /// No prior state (first restore)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for RawState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawState")
            .field("len", &self.data.len())
            .finish()
    }
}

/// Payload encoding inside the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Encoding {
    None,
    Base64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    data: String,
    #[serde(default = "default_encoding")]
    encoding: Encoding,
}

fn default_encoding() -> Encoding {
    Encoding::None
}

/// Decode a persisted state blob
///
/// Absent, empty or `null` input is the empty state. Anything else must be a
/// well-formed envelope.
pub fn decode(blob: Option<&[u8]>) -> Result<RawState, DecodeError> {
    let Some(blob) = blob else {
        return Ok(RawState::empty());
    };

    let trimmed = blob.trim_ascii();
    if trimmed.is_empty() || trimmed == b"null" {
        return Ok(RawState::empty());
    }

    let envelope: Envelope = serde_json::from_slice(trimmed)
        .map_err(|e| DecodeError::MalformedState(format!("invalid state envelope: {}", e)))?;

    let data = match envelope.encoding {
        Encoding::None => envelope.data.into_bytes(),
        Encoding::Base64 => STANDARD
            .decode(envelope.data.as_bytes())
            .map_err(|e| DecodeError::MalformedState(format!("invalid base64 payload: {}", e)))?,
    };

    Ok(RawState::from_bytes(data))
}

/// Encode a state for persistence
pub fn encode(state: &RawState) -> Vec<u8> {
    serde_json::json!({
        "data": STANDARD.encode(state.as_bytes()),
        "encoding": "base64",
    })
    .to_string()
    .into_bytes()
}
