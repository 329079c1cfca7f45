//! # IOPA Core - network inspector core
//!
//! Pure, synchronous building blocks of an inspector for IOPA servers:
//!
//! - **Patch**: lenient JSON-patch application with per-operation outcomes
//! - **Trace**: reconstruction of the context at every checkpoint of a
//!   middleware trace, with isolated per-stage diffs
//! - **Context**: decoded request/response contexts, table rows, cURL export
//! - **Formatter**: ordered body formatters, first match wins
//! - **Store**: request log fed by `request`/`response` plugin messages
//!
//! ## Core Principle
//!
//! > A malformed delta never hides the rest of the trace.
//!
//! Operations that cannot be applied are skipped and reported; only payloads
//! that cannot be read at all are errors.
//!
//! ## Example
//!
//! ```rust
//! use iopa_core::{ReconstructConfig, Trace};
//! use serde_json::json;
//!
//! let trace = Trace::from_json_str(r#"[
//!     ["auth", {
//!         "started": 1700000000000,
//!         "duration": 4,
//!         "next": true,
//!         "nextDuration": 1,
//!         "resumed": 1700000000003,
//!         "startJson": {"user": null},
//!         "nextDelta": [{"op": "replace", "path": "/user", "value": {"id": 7}}],
//!         "endDelta": [{"op": "add", "path": "/audit", "value": "ok"}]
//!     }]
//! ]"#).unwrap();
//!
//! let config = ReconstructConfig::default();
//! let expanded = trace.expand_stage("auth", &config).unwrap();
//!
//! assert_eq!(expanded.next_json, Some(json!({"user": {"id": 7}})));
//! assert_eq!(expanded.end_json, json!({"user": {"id": 7}, "audit": "ok"}));
//! assert_eq!(expanded.end_json_diffs, json!({"audit": "ok"}));
//! assert!(expanded.report().is_clean());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod formatter;
pub mod insights;
pub mod patch;
pub mod store;
pub mod trace;

// Re-export main types
pub use config::{ReconstructConfig, ReconstructConfigBuilder};
pub use context::{
    contexts_to_text, key_value_rows, to_curl_command, Body, Headers, KeyValueItem,
    RequestContext, ResponseContext, SerializedReply, SerializedRequest,
};
pub use error::{ErrorCategory, ErrorDetail, ErrorResponse, InspectorError, Result};
pub use formatter::{BodyFormat, Direction, FormattedBody, FormatterRegistry, Rendered};
pub use insights::{Insights, RetryInsights};
pub use patch::{apply_patch, Delta, JsonPointer, OpOutcome, PatchError, PatchOperation, PatchReport};
pub use store::{PluginEvent, RequestLog, RowStatus, StateExport};
pub use trace::{
    expand, isolate, DiffView, ExpandedTraceRecord, ExpansionReport, Phase, Trace, TraceRecord,
    TraceStage,
};
