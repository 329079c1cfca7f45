//! JSON patch application for middleware trace deltas
//!
//! Deltas are ordered lists of JSON-patch style operations addressed by
//! JSON pointers. Application is lenient: an operation that cannot be applied
//! leaves the document unchanged and is reported as an [`OpOutcome`] instead of
//! aborting the whole delta.
//!
//! ## Path rules
//!
//! - `/a/b` addresses key `b` of object `a`; `~1` decodes to `/`, `~0` to `~`
//! - A digits-only segment indexes an array, `-` appends to it
//! - Missing intermediate containers are created on write: an object when the
//!   following segment is a name, an array padded with `null` when it is an
//!   index or `-`

mod apply;
mod operation;
mod pointer;

pub use apply::{apply_operation, apply_patch, apply_patch_in_place, OpOutcome, Patched, PatchReport};
pub use operation::{Delta, DeltaEntry, PatchOperation};
pub use pointer::{JsonPointer, APPEND_MARKER};

pub(crate) use apply::{prepare_parent, write_value, WriteMode};

use thiserror::Error;

/// Why a single patch operation could not be applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// Path is the empty string
    #[error("empty path")]
    EmptyPath,

    /// Path does not start with `/`
    #[error("path '{path}' must start with '/'")]
    MissingLeadingSlash { path: String },

    /// `~` not followed by `0` or `1`
    #[error("invalid escape sequence in path '{path}'")]
    InvalidEscape { path: String },

    /// Traversal reached a string, number or boolean
    #[error("cannot descend into scalar value at segment '{token}'")]
    ScalarParent { token: String },

    /// Non-numeric segment used on an array
    #[error("segment '{token}' is not a valid array index")]
    InvalidArrayIndex { token: String },

    /// Writing would pad an array with too many empty slots
    #[error("index {index} exceeds array padding limit of {limit}")]
    PaddingLimit { index: usize, limit: usize },

    /// `move` into its own descendant
    #[error("cannot move '{from}' into its own child '{path}'")]
    MoveIntoDescendant { from: String, path: String },

    /// Delta entry is not a recognizable patch operation
    #[error("unrecognized patch entry: {entry}")]
    UnrecognizedEntry { entry: String },
}
