//! Request table columns

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::{
    format_bytes, format_duration, RequestContext, KEY_CONTENT_LENGTH, KEY_DURATION, KEY_ID,
    KEY_METHOD, KEY_ORIGINAL_URL, KEY_PATH, KEY_RESPONSE_CONTENT_LENGTH, KEY_RESPONSE_STATUS,
    KEY_TIMESTAMP,
};

/// Which headers a custom column reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Request,
    Response,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnKind::Request => "request",
            ColumnKind::Response => "response",
        })
    }
}

/// A user-added column showing one header
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomColumn {
    pub header: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
}

impl CustomColumn {
    pub fn new(header: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            header: header.into(),
            kind,
        }
    }

    /// Key the column's cached values are stored under
    pub fn key(&self) -> String {
        format!("_{}_header_{}", self.kind, self.header)
    }

    pub fn title(&self) -> String {
        format!("{} ({})", self.header, self.kind)
    }

    /// Current header value for a request
    pub(crate) fn resolve(&self, context: &RequestContext) -> Option<String> {
        let headers = match self.kind {
            ColumnKind::Request => &context.headers,
            ColumnKind::Response => &context.response.as_ref()?.headers,
        };
        headers.get(&self.header).map(str::to_string)
    }
}

/// A column of the request table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub visible: bool,
}

impl Column {
    fn new(key: &str, title: &str, width: Option<u32>) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            width,
            visible: true,
        }
    }

    fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

impl From<&CustomColumn> for Column {
    fn from(column: &CustomColumn) -> Self {
        Self {
            key: column.key(),
            title: column.title(),
            width: Some(200),
            visible: true,
        }
    }
}

/// Built-in columns in display order
pub fn base_columns() -> Vec<Column> {
    vec![
        Column::new(KEY_TIMESTAMP, "Request Time", Some(120)),
        Column::new(KEY_ID, "Id", Some(60)),
        Column::new(KEY_PATH, "Path", None),
        Column::new(KEY_ORIGINAL_URL, "Full URL", None).hidden(),
        Column::new(KEY_METHOD, "Method", Some(70)),
        Column::new(KEY_RESPONSE_STATUS, "Status", Some(70)),
        Column::new(KEY_CONTENT_LENGTH, "Req. Size", Some(100)),
        Column::new(KEY_RESPONSE_CONTENT_LENGTH, "Resp. Size", Some(100)),
        Column::new(KEY_DURATION, "Duration", Some(100)),
    ]
}

/// Display text of one cell
///
/// Unknown keys are looked up among cached custom column values.
pub fn cell_text(context: &RequestContext, key: &str) -> String {
    match key {
        KEY_TIMESTAMP => context.timestamp.format("%H:%M:%S%.3f").to_string(),
        KEY_ID => context.id.clone(),
        KEY_PATH => context.path.clone(),
        KEY_ORIGINAL_URL => context.original_url.clone(),
        KEY_METHOD => context.method.clone(),
        KEY_RESPONSE_STATUS => context
            .status_code()
            .filter(|s| *s != 0)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        KEY_CONTENT_LENGTH => format_bytes(context.content_length as f64),
        KEY_RESPONSE_CONTENT_LENGTH => context
            .response_content_length()
            .map(|n| format_bytes(n as f64))
            .unwrap_or_default(),
        KEY_DURATION => context.duration.map(format_duration).unwrap_or_default(),
        other => context.column_value(other).unwrap_or_default().to_string(),
    }
}

/// Row highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Normal,
    /// Served by a mock
    Mocked,
    /// 4xx or 5xx response
    Error,
}

/// Highlighting for a request row; mocks take precedence over errors
pub fn row_status(context: &RequestContext) -> RowStatus {
    if context.is_mock {
        return RowStatus::Mocked;
    }
    match context.status_code() {
        Some(status) if (400..600).contains(&status) => RowStatus::Error,
        _ => RowStatus::Normal,
    }
}
