//! Middleware trace reconstruction
//!
//! A trace is the ordered list of middleware stages a request passed through.
//! Each stage records the context it received (`startJson`) and relative
//! JSON-patch deltas for what it changed:
//!
//! - `nextDelta`: before handing control to the next middleware
//! - `resumeDelta`: after control came back
//! - `endDelta`: up to stage completion
//!
//! [`expand`] rebuilds the absolute context at each checkpoint and the
//! isolated diffs a viewer shows per stage.
//!
//! ## Example
//!
//! ```rust
//! use iopa_core::trace::{Phase, Trace};
//! use iopa_core::ReconstructConfig;
//! use serde_json::json;
//!
//! let trace = Trace::from_value(json!([
//!     ["cors", {
//!         "started": 0, "duration": 2, "next": false,
//!         "startJson": {"iopa.Headers": {"origin": "a"}},
//!         "endDelta": [{"op": "add", "path": "/iopa.Headers/vary", "value": "Origin"}]
//!     }]
//! ])).unwrap();
//!
//! let expanded = trace.expand(0, &ReconstructConfig::default()).unwrap();
//! let diff = expanded.diff(Phase::End).unwrap();
//! assert_eq!(diff.before, &json!({"iopa.Headers": {}}));
//! assert_eq!(diff.after, &json!({"iopa.Headers": {"vary": "Origin"}}));
//! ```

mod expand;
mod isolate;
mod record;

pub use expand::{expand, DiffView, ExpandedTraceRecord, ExpansionReport};
pub use isolate::{isolate, isolated_diff, IsolatedDiff};
pub use record::{Phase, Trace, TraceRecord, TraceStage};

pub(crate) use record::json_type_name;
