//! Request and response contexts
//!
//! The instrumented server sends contexts as flat JSON objects with namespaced
//! keys (`iopa.Method`, `server.Timestamp`, ...). [`SerializedRequest`] and
//! [`SerializedReply`] mirror that wire form; [`RequestContext`] and
//! [`ResponseContext`] are the decoded views the inspector works with.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use super::body::Body;
use super::headers::Headers;
use super::rows::{ContextFields, FieldValue};
use crate::error::{InspectorError, Result};
use crate::trace::Trace;

pub const KEY_ID: &str = "iopa.Id";
pub const KEY_METHOD: &str = "iopa.Method";
pub const KEY_ORIGINAL_URL: &str = "iopa.OriginalUrl";
pub const KEY_URL: &str = "iopa.Url";
pub const KEY_HEADERS: &str = "iopa.Headers";
pub const KEY_BODY: &str = "iopa.Body";
pub const KEY_PARAMS: &str = "iopa.Params";
pub const KEY_CONTENT_LENGTH: &str = "iopa.ContentLength";
pub const KEY_STATUS_CODE: &str = "iopa.StatusCode";
pub const KEY_STATUS_TEXT: &str = "iopa.StatusText";
pub const KEY_TIMESTAMP: &str = "server.Timestamp";
pub const KEY_TRACE: &str = "server.Trace";
pub const KEY_DURATION: &str = "server.Duration";
pub const KEY_PATH: &str = "flipper.Path";
pub const KEY_IS_MOCK: &str = "flipper.isMock";
pub const KEY_RESPONSE: &str = "response";
pub const KEY_RESPONSE_STATUS: &str = "response.StatusCode";
pub const KEY_RESPONSE_CONTENT_LENGTH: &str = "response.ContentLength";

/// Keys computed on ingest; dropped from the extra fields of incoming payloads
const DERIVED_KEYS: &[&str] = &[
    KEY_URL,
    KEY_PATH,
    KEY_CONTENT_LENGTH,
    KEY_RESPONSE_STATUS,
    KEY_RESPONSE_CONTENT_LENGTH,
    KEY_DURATION,
];

/// Request context as sent by the instrumented server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedRequest {
    #[serde(rename = "iopa.Id")]
    pub id: String,

    #[serde(rename = "iopa.Method", default)]
    pub method: String,

    #[serde(rename = "iopa.OriginalUrl", default)]
    pub original_url: String,

    #[serde(rename = "iopa.Headers", default)]
    pub headers: Headers,

    /// Plain string, or `[base64]` for binary payloads
    #[serde(rename = "iopa.Body", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(rename = "iopa.Params", default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,

    /// Milliseconds since the Unix epoch
    #[serde(rename = "server.Timestamp", default)]
    pub timestamp: f64,

    /// Middleware trace, parsed on demand
    #[serde(rename = "server.Trace", default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Value>,

    #[serde(rename = "flipper.isMock", default, skip_serializing_if = "Option::is_none")]
    pub is_mock: Option<bool>,

    /// Reply, present in exported snapshots
    #[serde(rename = "response", default, skip_serializing_if = "Option::is_none")]
    pub response: Option<SerializedReply>,

    /// Any other key
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response context as sent by the instrumented server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedReply {
    #[serde(rename = "iopa.Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "iopa.StatusCode", default)]
    pub status_code: u16,

    #[serde(rename = "iopa.StatusText", default)]
    pub status_text: String,

    #[serde(rename = "iopa.Headers", default)]
    pub headers: Headers,

    #[serde(rename = "iopa.Body", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(rename = "server.Timestamp", default)]
    pub timestamp: f64,

    #[serde(rename = "server.Duration", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A captured request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub original_url: String,
    /// Parsed `original_url`; `None` when it is not a valid absolute URL
    pub url: Option<Url>,
    /// Path component of the URL, empty when the URL did not parse
    pub path: String,
    pub headers: Headers,
    pub body: Option<Body>,
    /// Request body size in bytes
    pub content_length: usize,
    pub params: Option<Map<String, Value>>,
    pub trace: Option<Value>,
    pub is_mock: bool,
    pub extra: Map<String, Value>,

    pub response: Option<ResponseContext>,
    /// Milliseconds between request and reply timestamps
    pub duration: Option<f64>,

    /// Cached values of custom header columns, keyed by column key
    pub(crate) column_values: BTreeMap<String, Option<String>>,
}

/// A captured response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseContext {
    pub id: Option<String>,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Option<Body>,
    pub content_length: usize,
    pub timestamp: DateTime<Utc>,
    pub duration: Option<f64>,
    pub extra: Map<String, Value>,
}

/// Parse an absolute URL
pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| InspectorError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

pub(crate) fn timestamp_from_millis(millis: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis.round() as i64).unwrap_or_default()
}

fn timestamp_to_millis(timestamp: &DateTime<Utc>) -> f64 {
    timestamp.timestamp_millis() as f64
}

fn strip_derived(mut extra: Map<String, Value>) -> Map<String, Value> {
    for key in DERIVED_KEYS {
        extra.remove(*key);
    }
    extra
}

impl RequestContext {
    /// Decode a serialized request
    ///
    /// An unparseable URL or body is logged and left empty rather than
    /// rejecting the request.
    pub fn from_serialized(data: SerializedRequest) -> Self {
        let url = if data.original_url.is_empty() {
            None
        } else {
            match parse_url(&data.original_url) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!("{}", err);
                    None
                }
            }
        };
        let path = url.as_ref().map(|u| u.path().to_string()).unwrap_or_default();
        let body = Body::decode(data.body.as_ref());
        let content_length = body.as_ref().map_or(0, Body::len);

        let mut context = Self {
            id: data.id,
            timestamp: timestamp_from_millis(data.timestamp),
            method: data.method,
            original_url: data.original_url,
            url,
            path,
            headers: data.headers,
            body,
            content_length,
            params: data.params,
            trace: data.trace,
            is_mock: data.is_mock.unwrap_or(false),
            extra: strip_derived(data.extra),
            response: None,
            duration: None,
            column_values: BTreeMap::new(),
        };

        if let Some(reply) = data.response {
            context.set_response(ResponseContext::from_serialized(reply), None);
        }
        context
    }

    /// Merge the request half of a response event
    ///
    /// Identity fields (id, timestamp, method, URL, headers) keep the values
    /// captured with the original request.
    pub fn merge_request(&mut self, data: SerializedRequest) {
        if let Some(raw) = data.body {
            self.body = Body::decode(Some(&raw));
            self.content_length = self.body.as_ref().map_or(0, Body::len);
        }
        if let Some(params) = data.params {
            self.params = Some(params);
        }
        if let Some(trace) = data.trace {
            self.trace = Some(trace);
        }
        if let Some(is_mock) = data.is_mock {
            self.is_mock = is_mock;
        }
        self.extra.extend(strip_derived(data.extra));
    }

    /// Attach a response; `duration` overrides the reply's own duration
    pub fn set_response(&mut self, response: ResponseContext, duration: Option<f64>) {
        self.duration = duration.or(response.duration);
        self.response = Some(response);
    }

    /// Status code of the response, if one arrived
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }

    /// Response body size in bytes, if a response arrived
    pub fn response_content_length(&self) -> Option<usize> {
        self.response.as_ref().map(|r| r.content_length)
    }

    /// Parse the middleware trace, if one was captured
    pub fn parsed_trace(&self) -> Result<Option<Trace>> {
        self.trace.clone().map(Trace::from_value).transpose()
    }

    /// Cached value of a custom column
    pub fn column_value(&self, key: &str) -> Option<&str> {
        self.column_values.get(key).and_then(|v| v.as_deref())
    }

    /// Wire form, including the response when present
    pub fn to_serialized(&self) -> SerializedRequest {
        SerializedRequest {
            id: self.id.clone(),
            method: self.method.clone(),
            original_url: self.original_url.clone(),
            headers: self.headers.clone(),
            body: self.body.as_ref().map(Body::to_serialized),
            params: self.params.clone(),
            timestamp: timestamp_to_millis(&self.timestamp),
            trace: self.trace.clone(),
            is_mock: self.is_mock.then_some(true),
            response: self.response.as_ref().map(|r| {
                let mut reply = r.to_serialized();
                reply.duration = self.duration.or(reply.duration);
                reply
            }),
            extra: self.extra.clone(),
        }
    }
}

impl ResponseContext {
    pub fn from_serialized(data: SerializedReply) -> Self {
        let body = Body::decode(data.body.as_ref());
        let content_length = body.as_ref().map_or(0, Body::len);
        Self {
            id: data.id,
            status_code: data.status_code,
            status_text: data.status_text,
            headers: data.headers,
            body,
            content_length,
            timestamp: timestamp_from_millis(data.timestamp),
            duration: data.duration,
            extra: strip_derived(data.extra),
        }
    }

    pub fn to_serialized(&self) -> SerializedReply {
        SerializedReply {
            id: self.id.clone(),
            status_code: self.status_code,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.as_ref().map(Body::to_serialized),
            timestamp: timestamp_to_millis(&self.timestamp),
            duration: self.duration,
            extra: self.extra.clone(),
        }
    }
}

fn time_value(timestamp: &DateTime<Utc>) -> FieldValue<'static> {
    FieldValue::Json(Value::String(
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
    ))
}

impl ContextFields for RequestContext {
    fn fields(&self) -> Vec<(&str, FieldValue<'_>)> {
        let mut fields = vec![
            (KEY_ID, FieldValue::Json(Value::String(self.id.clone()))),
            (KEY_TIMESTAMP, time_value(&self.timestamp)),
            (KEY_METHOD, FieldValue::Json(Value::String(self.method.clone()))),
            (KEY_ORIGINAL_URL, FieldValue::Json(Value::String(self.original_url.clone()))),
            (KEY_HEADERS, FieldValue::Headers(&self.headers)),
        ];
        if let Some(body) = &self.body {
            fields.push((KEY_BODY, FieldValue::Json(body.to_serialized())));
        }
        if let Some(params) = &self.params {
            fields.push((KEY_PARAMS, FieldValue::Json(Value::Object(params.clone()))));
        }
        if let Some(trace) = &self.trace {
            fields.push((KEY_TRACE, FieldValue::Json(trace.clone())));
        }
        fields.push((KEY_IS_MOCK, FieldValue::Json(Value::Bool(self.is_mock))));
        fields.extend(
            self.extra
                .iter()
                .map(|(k, v)| (k.as_str(), FieldValue::Json(v.clone()))),
        );
        if let Some(url) = &self.url {
            fields.push((KEY_URL, FieldValue::Url(url)));
        }
        fields.push((KEY_PATH, FieldValue::Json(Value::String(self.path.clone()))));
        fields.push((KEY_CONTENT_LENGTH, FieldValue::Json(self.content_length.into())));
        if let Some(status) = self.status_code() {
            fields.push((KEY_RESPONSE_STATUS, FieldValue::Json(status.into())));
        }
        if let Some(length) = self.response_content_length() {
            fields.push((KEY_RESPONSE_CONTENT_LENGTH, FieldValue::Json(length.into())));
        }
        if let Some(duration) = self.duration {
            fields.push((KEY_DURATION, FieldValue::Json(duration.into())));
        }
        fields
    }
}

impl ContextFields for ResponseContext {
    fn fields(&self) -> Vec<(&str, FieldValue<'_>)> {
        let mut fields = Vec::new();
        if let Some(id) = &self.id {
            fields.push((KEY_ID, FieldValue::Json(Value::String(id.clone()))));
        }
        fields.push((KEY_STATUS_CODE, FieldValue::Json(self.status_code.into())));
        fields.push((KEY_STATUS_TEXT, FieldValue::Json(Value::String(self.status_text.clone()))));
        fields.push((KEY_HEADERS, FieldValue::Headers(&self.headers)));
        if let Some(body) = &self.body {
            fields.push((KEY_BODY, FieldValue::Json(body.to_serialized())));
        }
        fields.push((KEY_TIMESTAMP, time_value(&self.timestamp)));
        if let Some(duration) = self.duration {
            fields.push((KEY_DURATION, FieldValue::Json(duration.into())));
        }
        fields.extend(
            self.extra
                .iter()
                .map(|(k, v)| (k.as_str(), FieldValue::Json(v.clone()))),
        );
        fields
    }
}
