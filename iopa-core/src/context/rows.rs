//! Key/value rows for context tables
//!
//! Each context type lists its fields once through [`ContextFields`]; the
//! row builders then filter that list against fixed blacklists. Fields holding
//! a URL are shown as their `href`, header maps as plain objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::headers::Headers;

/// Keys never included in the JSON view of a context
pub const STRINGIFY_BLACKLIST: &[&str] = &[
    "iopa.RawRequest",
    "iopa.RawResponse",
    "iopa.Body",
    "server.CancelToken",
    "server.CancelTokenSource",
    "server.Environment",
    "server.Events",
    "server.Capabilities",
];

/// Keys shown elsewhere in the detail view and left out of the context table
pub const KEY_VALUE_BLACKLIST: &[&str] = &[
    "iopa.Url",
    "iopa.OriginalUrl",
    "iopa.Headers",
    "iopa.Method",
    "iopa.ContentLength",
    "iopa.Params",
    "flipper.Path",
    "response",
    "response.StatusCode",
    "response.ContentLength",
    "server.Duration",
    "server.Trace",
];

/// One row of a key/value table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueItem {
    pub key: String,
    pub value: Value,
}

impl KeyValueItem {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Value of one context field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Json(Value),
    Url(&'a Url),
    Headers(&'a Headers),
}

impl FieldValue<'_> {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Json(value) => value.clone(),
            FieldValue::Url(url) => Value::String(url.as_str().to_string()),
            FieldValue::Headers(headers) => headers.to_json(),
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, FieldValue::Json(Value::Null))
    }
}

/// A context that can list its fields in display order
pub trait ContextFields {
    fn fields(&self) -> Vec<(&str, FieldValue<'_>)>;
}

fn visible_fields<'a>(
    context: &'a dyn ContextFields,
    blacklists: &'a [&'a [&'a str]],
) -> impl Iterator<Item = (&'a str, FieldValue<'a>)> + 'a {
    context.fields().into_iter().filter(move |(key, value)| {
        !key.starts_with('_')
            && !value.is_null()
            && !blacklists.iter().any(|list| list.contains(key))
    })
}

/// Rows of the context table, one per visible field
pub fn key_value_rows(context: &dyn ContextFields) -> Vec<KeyValueItem> {
    visible_fields(context, &[STRINGIFY_BLACKLIST, KEY_VALUE_BLACKLIST])
        .map(|(key, value)| KeyValueItem::new(key, value.to_json()))
        .collect()
}

/// JSON view of a context, without raw payloads
pub fn context_json(context: &dyn ContextFields) -> Map<String, Value> {
    visible_fields(context, &[STRINGIFY_BLACKLIST])
        .map(|(key, value)| (key.to_string(), value.to_json()))
        .collect()
}

/// `url`, `host`, `path` and, when present, `query` rows
pub fn url_rows(url: &Url) -> Vec<KeyValueItem> {
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    let mut rows = vec![
        KeyValueItem::new("url", url.as_str()),
        KeyValueItem::new("host", host),
        KeyValueItem::new("path", url.path()),
    ];
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        rows.push(KeyValueItem::new("query", format!("?{}", query)));
    }
    rows
}

/// Header rows sorted by name
pub fn header_rows(headers: &Headers) -> Vec<KeyValueItem> {
    headers
        .iter()
        .map(|(name, value)| KeyValueItem::new(name, value))
        .collect()
}

/// Rows for route or query parameters
pub fn param_rows(params: &Map<String, Value>) -> Vec<KeyValueItem> {
    params
        .iter()
        .map(|(key, value)| KeyValueItem::new(key.as_str(), value.clone()))
        .collect()
}
