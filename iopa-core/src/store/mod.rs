//! Request log
//!
//! Ingests the `request` and `response` messages of an instrumented server
//! and keeps the decoded contexts for display:
//!
//! - Requests are keyed by `iopa.Id`; a repeated id is ignored
//! - A response is merged into its request, which may already be gone
//! - Custom columns cache one request or response header per row
//! - The whole log can be exported and re-imported as a [`StateExport`]

mod columns;
mod event;
mod log;

pub use columns::{base_columns, cell_text, row_status, Column, ColumnKind, CustomColumn, RowStatus};
pub use event::{PluginEvent, StateExport};
pub use log::RequestLog;
