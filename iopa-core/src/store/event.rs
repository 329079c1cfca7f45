//! Plugin messages and snapshots

use serde::{Deserialize, Serialize};

use super::columns::CustomColumn;
use crate::context::{SerializedReply, SerializedRequest};

/// A message from the instrumented server
///
/// ```json
/// {"method": "request", "params": {"iopa.Id": "1", ...}}
/// {"method": "response", "params": [{"iopa.Id": "1", ...}, {"iopa.StatusCode": 200, ...}]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "lowercase")]
pub enum PluginEvent {
    Request(SerializedRequest),
    Response(SerializedRequest, SerializedReply),
}

/// Exported state of a request log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateExport {
    pub serialized_contexts: Vec<SerializedRequest>,
    #[serde(default)]
    pub selected_id: Option<String>,
    #[serde(default)]
    pub custom_columns: Vec<CustomColumn>,
}
