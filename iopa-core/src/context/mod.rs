//! Request and response contexts
//!
//! Decoded views of the contexts the instrumented server reports, plus the
//! pure helpers a detail view is built from:
//!
//! ```text
//! SerializedRequest ──► RequestContext ──┬─► key_value_rows / url_rows / header_rows
//!   (wire JSON)         (decoded body,    ├─► to_curl_command
//!                        parsed URL)      └─► contexts_to_text
//! ```

mod body;
mod curl;
mod format;
mod headers;
mod request;
mod rows;
mod text;

pub use body::{body_as_binary, body_as_string, Body, BINARY_BODY, EMPTY_BODY};
pub use curl::{escaped_string, to_curl_command};
pub use format::{format_bytes, format_duration, StatusClass};
pub use headers::Headers;
pub use request::{
    parse_url, RequestContext, ResponseContext, SerializedReply, SerializedRequest, KEY_BODY,
    KEY_CONTENT_LENGTH, KEY_DURATION, KEY_HEADERS, KEY_ID, KEY_IS_MOCK, KEY_METHOD,
    KEY_ORIGINAL_URL, KEY_PARAMS, KEY_PATH, KEY_RESPONSE, KEY_RESPONSE_CONTENT_LENGTH,
    KEY_RESPONSE_STATUS, KEY_STATUS_CODE, KEY_STATUS_TEXT, KEY_TIMESTAMP, KEY_TRACE, KEY_URL,
};
pub use rows::{
    context_json, header_rows, key_value_rows, param_rows, url_rows, ContextFields, FieldValue,
    KeyValueItem, KEY_VALUE_BLACKLIST, STRINGIFY_BLACKLIST,
};
pub use text::{contexts_to_text, EMPTY_REQUEST};
