//! Patch operation model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single JSON-patch operation
///
/// A missing `value` deserializes as `null`, which is what an `undefined`
/// value becomes once a trace has been serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert a value, or append with the `-` marker
    Add {
        path: String,
        #[serde(default)]
        value: Value,
    },
    /// Drop the value at `path`
    Remove { path: String },
    /// Overwrite the value at `path`
    Replace {
        path: String,
        #[serde(default)]
        value: Value,
    },
    /// Remove at `from` and add at `path`
    Move { from: String, path: String },
    /// Add a copy of the value at `from` at `path`
    Copy { from: String, path: String },
    /// Check the value at `path`
    Test {
        path: String,
        #[serde(default)]
        value: Value,
    },
}

impl PatchOperation {
    /// Target path of the operation
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Copy { path, .. }
            | PatchOperation::Test { path, .. } => path,
        }
    }

    /// Lowercase operation name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::Replace { .. } => "replace",
            PatchOperation::Move { .. } => "move",
            PatchOperation::Copy { .. } => "copy",
            PatchOperation::Test { .. } => "test",
        }
    }

    /// Operations that take part in diff isolation
    pub fn is_isolated(&self) -> bool {
        matches!(
            self,
            PatchOperation::Add { .. } | PatchOperation::Remove { .. } | PatchOperation::Replace { .. }
        )
    }

    /// Convenience constructor for `add`
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        PatchOperation::Add {
            path: path.into(),
            value,
        }
    }

    /// Convenience constructor for `remove`
    pub fn remove(path: impl Into<String>) -> Self {
        PatchOperation::Remove { path: path.into() }
    }

    /// Convenience constructor for `replace`
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        PatchOperation::Replace {
            path: path.into(),
            value,
        }
    }
}

/// One entry of a delta as captured by the instrumentation
///
/// Entries that are not valid operations are kept verbatim so a single bad
/// entry does not make the whole trace unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeltaEntry {
    /// A recognized operation
    Op(PatchOperation),
    /// Anything else
    Unrecognized(Value),
}

/// Ordered sequence of patch operations for one phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta(Vec<DeltaEntry>);

impl Delta {
    /// Create an empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including unrecognized ones
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All entries in application order
    pub fn entries(&self) -> &[DeltaEntry] {
        &self.0
    }

    /// Recognized operations in application order
    pub fn operations(&self) -> impl Iterator<Item = &PatchOperation> {
        self.0.iter().filter_map(|entry| match entry {
            DeltaEntry::Op(op) => Some(op),
            DeltaEntry::Unrecognized(_) => None,
        })
    }

    /// Append an operation
    pub fn push(&mut self, op: PatchOperation) {
        self.0.push(DeltaEntry::Op(op));
    }

    /// Concatenate deltas in order
    pub fn concat<'a>(deltas: impl IntoIterator<Item = &'a Delta>) -> Delta {
        Delta(
            deltas
                .into_iter()
                .flat_map(|d| d.0.iter().cloned())
                .collect(),
        )
    }
}

impl From<Vec<PatchOperation>> for Delta {
    fn from(ops: Vec<PatchOperation>) -> Self {
        Delta(ops.into_iter().map(DeltaEntry::Op).collect())
    }
}

impl FromIterator<PatchOperation> for Delta {
    fn from_iter<I: IntoIterator<Item = PatchOperation>>(iter: I) -> Self {
        Delta(iter.into_iter().map(DeltaEntry::Op).collect())
    }
}
