//! Request and response bodies
//!
//! On the wire a body is either a plain string or a one-element array holding
//! base64 for binary payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::warn;

use crate::error::{InspectorError, Result};

/// Shown for a missing body
pub const EMPTY_BODY: &str = "(empty)";

/// Shown instead of binary content
pub const BINARY_BODY: &str = "(binary data)";

/// A decoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    /// Decode a serialized body, dropping it with a warning when it is invalid
    ///
    /// Missing, `null` and empty bodies decode to `None`, as does a binary
    /// body with no bytes.
    pub fn decode(raw: Option<&Value>) -> Option<Body> {
        let raw = raw?;
        match Self::try_decode(raw) {
            Ok(body) => body,
            Err(err) => {
                warn!("Failed to decode request/response body: {}", err);
                None
            }
        }
    }

    /// Decode a serialized body
    pub fn try_decode(raw: &Value) -> Result<Option<Body>> {
        match raw {
            Value::Null => Ok(None),
            Value::String(text) if text.is_empty() => Ok(None),
            Value::String(text) => Ok(Some(Body::Text(text.clone()))),
            Value::Array(items) => {
                let encoded = match items.first() {
                    Some(Value::String(encoded)) => encoded,
                    _ => {
                        return Err(InspectorError::BodyDecode {
                            size: items.len(),
                            reason: "expected a base64 string".to_string(),
                        })
                    }
                };
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| InspectorError::BodyDecode {
                        size: encoded.len(),
                        reason: e.to_string(),
                    })?;
                Ok((!bytes.is_empty()).then_some(Body::Binary(bytes)))
            }
            other => Err(InspectorError::BodyDecode {
                size: other.to_string().len(),
                reason: format!("unexpected {}", crate::trace::json_type_name(other)),
            }),
        }
    }

    /// Wire form of the body
    pub fn to_serialized(&self) -> Value {
        match self {
            Body::Text(text) => Value::String(text.clone()),
            Body::Binary(bytes) => Value::Array(vec![Value::String(STANDARD.encode(bytes))]),
        }
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        match self {
            Body::Text(text) => text.len(),
            Body::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Body::Binary(bytes) => Some(bytes),
            Body::Text(_) => None,
        }
    }
}

/// Display text for an optional body
pub fn body_as_string(body: Option<&Body>) -> &str {
    match body {
        None => EMPTY_BODY,
        Some(Body::Binary(_)) => BINARY_BODY,
        Some(Body::Text(text)) => text,
    }
}

/// Raw bytes of a binary body
pub fn body_as_binary(body: Option<&Body>) -> Option<&[u8]> {
    body.and_then(Body::as_binary)
}
