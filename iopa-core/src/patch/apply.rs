//! Lenient patch application

use serde_json::{Map, Value};
use tracing::debug;

use super::pointer::{array_index, is_array_token, JsonPointer, APPEND_MARKER};
use super::{Delta, DeltaEntry, PatchError, PatchOperation};
use crate::config::ReconstructConfig;

/// What happened to one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// The document changed
    Applied,
    /// Valid operation, nothing to change (e.g. removing a missing key)
    Unchanged,
    /// A `test` operation matched
    Verified,
    /// A `test` operation did not match; the document is left as is
    TestFailed,
    /// The operation could not be applied and was skipped
    Malformed(PatchError),
}

impl OpOutcome {
    /// True when the operation was skipped because its input was invalid
    pub fn is_malformed(&self) -> bool {
        matches!(self, OpOutcome::Malformed(_))
    }
}

/// Per-operation outcomes of one delta, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    outcomes: Vec<OpOutcome>,
}

impl PatchReport {
    /// Outcomes indexed like the delta entries
    pub fn outcomes(&self) -> &[OpOutcome] {
        &self.outcomes
    }

    /// True when at least one operation changed the document
    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|o| *o == OpOutcome::Applied)
    }

    /// True when no operation was skipped and no test failed
    pub fn is_clean(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| !o.is_malformed() && *o != OpOutcome::TestFailed)
    }

    /// Skipped operations with their delta index
    pub fn malformed(&self) -> impl Iterator<Item = (usize, &PatchError)> {
        self.outcomes.iter().enumerate().filter_map(|(i, o)| match o {
            OpOutcome::Malformed(err) => Some((i, err)),
            _ => None,
        })
    }
}

/// A patched copy of a document together with its report
#[derive(Debug, Clone, PartialEq)]
pub struct Patched {
    /// The resulting document
    pub document: Value,
    /// What happened to each operation
    pub report: PatchReport,
}

/// Apply a delta to a deep copy of `document`
///
/// The input is never touched; every operation that cannot be applied is
/// skipped and recorded in the report.
pub fn apply_patch(document: &Value, delta: &Delta, config: &ReconstructConfig) -> Patched {
    let mut document = document.clone();
    let report = apply_patch_in_place(&mut document, delta, config);
    Patched { document, report }
}

/// Apply a delta to `document` in place
pub fn apply_patch_in_place(
    document: &mut Value,
    delta: &Delta,
    config: &ReconstructConfig,
) -> PatchReport {
    let mut report = PatchReport::default();
    for (index, entry) in delta.entries().iter().enumerate() {
        let outcome = match entry {
            DeltaEntry::Op(op) => apply_operation(document, op, config),
            DeltaEntry::Unrecognized(raw) => OpOutcome::Malformed(PatchError::UnrecognizedEntry {
                entry: raw.to_string(),
            }),
        };
        if let OpOutcome::Malformed(err) = &outcome {
            debug!(index, error = %err, "skipping patch operation");
        }
        report.outcomes.push(outcome);
    }
    report
}

/// Apply a single operation in place
pub fn apply_operation(
    document: &mut Value,
    op: &PatchOperation,
    config: &ReconstructConfig,
) -> OpOutcome {
    match try_apply(document, op, config.max_array_padding) {
        Ok(outcome) => outcome,
        Err(err) => OpOutcome::Malformed(err),
    }
}

fn try_apply(document: &mut Value, op: &PatchOperation, limit: usize) -> Result<OpOutcome, PatchError> {
    match op {
        PatchOperation::Add { path, value } => {
            let pointer = JsonPointer::parse(path)?;
            write_value(document, &pointer, value.clone(), WriteMode::Insert, limit)
        }
        PatchOperation::Replace { path, value } => {
            let pointer = JsonPointer::parse(path)?;
            write_value(document, &pointer, value.clone(), WriteMode::Set, limit)
        }
        PatchOperation::Remove { path } => {
            let pointer = JsonPointer::parse(path)?;
            Ok(match remove_value(document, &pointer)? {
                Some(_) => OpOutcome::Applied,
                None => OpOutcome::Unchanged,
            })
        }
        PatchOperation::Move { from, path } => {
            let source = JsonPointer::parse(from)?;
            let target = JsonPointer::parse(path)?;
            if source == target {
                return Ok(OpOutcome::Unchanged);
            }
            if target.starts_with(&source) {
                return Err(PatchError::MoveIntoDescendant {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let Some(value) = remove_value(document, &source)? else {
                return Ok(OpOutcome::Unchanged);
            };
            match write_value(document, &target, value.clone(), WriteMode::Insert, limit) {
                Ok(_) => Ok(OpOutcome::Applied),
                Err(err) => {
                    // put the value back where it came from
                    if let Err(restore) =
                        write_value(document, &source, value, WriteMode::Insert, limit)
                    {
                        debug!(from = %source, error = %restore, "could not restore moved value");
                    }
                    Err(err)
                }
            }
        }
        PatchOperation::Copy { from, path } => {
            let source = JsonPointer::parse(from)?;
            let target = JsonPointer::parse(path)?;
            let Some(value) = source.get(document).cloned() else {
                return Ok(OpOutcome::Unchanged);
            };
            write_value(document, &target, value, WriteMode::Insert, limit)
        }
        PatchOperation::Test { path, value } => {
            let pointer = JsonPointer::parse(path)?;
            Ok(if pointer.get(document) == Some(value) {
                OpOutcome::Verified
            } else {
                OpOutcome::TestFailed
            })
        }
    }
}

/// How a write lands on an existing array slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Shift later elements right
    Insert,
    /// Overwrite the slot
    Set,
}

/// Write `value` at `pointer`, creating missing containers on the way
pub(crate) fn write_value(
    document: &mut Value,
    pointer: &JsonPointer,
    value: Value,
    mode: WriteMode,
    limit: usize,
) -> Result<OpOutcome, PatchError> {
    check_path(document, pointer, limit, true)?;
    let (parents, leaf) = pointer.split_last();
    let container = walk_creating(document, parents, leaf, limit)?;

    match container {
        Value::Object(map) => {
            if map.get(leaf) == Some(&value) {
                return Ok(OpOutcome::Unchanged);
            }
            map.insert(leaf.to_string(), value);
            Ok(OpOutcome::Applied)
        }
        Value::Array(items) => {
            if leaf == APPEND_MARKER {
                items.push(value);
                return Ok(OpOutcome::Applied);
            }
            let index = array_index(leaf).ok_or_else(|| PatchError::InvalidArrayIndex {
                token: leaf.to_string(),
            })?;
            match mode {
                WriteMode::Insert if index <= items.len() => {
                    items.insert(index, value);
                    Ok(OpOutcome::Applied)
                }
                WriteMode::Set if index < items.len() => {
                    if items[index] == value {
                        Ok(OpOutcome::Unchanged)
                    } else {
                        items[index] = value;
                        Ok(OpOutcome::Applied)
                    }
                }
                _ => {
                    pad(items, index, limit)?;
                    items.push(value);
                    Ok(OpOutcome::Applied)
                }
            }
        }
        _ => Err(PatchError::ScalarParent {
            token: leaf.to_string(),
        }),
    }
}

/// Create the containers `pointer` needs without writing its leaf
///
/// Arrays are padded up to (not including) the leaf index, so a later
/// insert at that index lands exactly there.
pub(crate) fn prepare_parent(
    document: &mut Value,
    pointer: &JsonPointer,
    limit: usize,
) -> Result<(), PatchError> {
    check_path(document, pointer, limit, false)?;
    let (parents, leaf) = pointer.split_last();
    let container = walk_creating(document, parents, leaf, limit)?;
    if let (Value::Array(items), Some(index)) = (container, array_index(leaf)) {
        if index > items.len() {
            pad(items, index, limit)?;
        }
    }
    Ok(())
}

/// Remove the value at `pointer`; `None` when there is nothing there
pub(crate) fn remove_value(
    document: &mut Value,
    pointer: &JsonPointer,
) -> Result<Option<Value>, PatchError> {
    let (parents, leaf) = pointer.split_last();
    let mut current = document;
    for token in parents {
        current = match current {
            Value::Object(map) => match map.get_mut(token) {
                Some(child) => child,
                None => return Ok(None),
            },
            Value::Array(items) => match array_index(token).and_then(|i| items.get_mut(i)) {
                Some(child) => child,
                None => return Ok(None),
            },
            Value::Null => return Ok(None),
            _ => {
                return Err(PatchError::ScalarParent {
                    token: token.clone(),
                })
            }
        };
    }

    match current {
        Value::Object(map) => Ok(map.remove(leaf)),
        Value::Array(items) => {
            if leaf == APPEND_MARKER {
                return Ok(None);
            }
            let index = array_index(leaf).ok_or_else(|| PatchError::InvalidArrayIndex {
                token: leaf.to_string(),
            })?;
            Ok((index < items.len()).then(|| items.remove(index)))
        }
        Value::Null => Ok(None),
        _ => Err(PatchError::ScalarParent {
            token: leaf.to_string(),
        }),
    }
}

/// Fail with the error `walk_creating` would hit, without touching `document`
///
/// Missing or null containers are treated as the empty container the walk
/// would create for them. With `leaf_required` the leaf slot itself must be
/// writable, as for `write_value`.
fn check_path(
    document: &Value,
    pointer: &JsonPointer,
    limit: usize,
    leaf_required: bool,
) -> Result<(), PatchError> {
    let (parents, leaf) = pointer.split_last();
    let mut current = Some(document).filter(|v| !v.is_null());
    for token in parents {
        current = match current {
            None => {
                if is_array_token(token) {
                    check_slot(0, token, limit)?;
                }
                None
            }
            Some(Value::Object(map)) => map.get(token),
            Some(Value::Array(items)) => items.get(check_slot(items.len(), token, limit)?),
            Some(_) => {
                return Err(PatchError::ScalarParent {
                    token: token.clone(),
                })
            }
        }
        .filter(|v| !v.is_null());
    }

    match current {
        None if is_array_token(leaf) && (leaf_required || array_index(leaf).is_some()) => {
            check_slot(0, leaf, limit).map(|_| ())
        }
        Some(Value::Array(items)) if leaf_required || array_index(leaf).is_some() => {
            check_slot(items.len(), leaf, limit).map(|_| ())
        }
        None | Some(Value::Object(_)) | Some(Value::Array(_)) => Ok(()),
        Some(_) if leaf_required => Err(PatchError::ScalarParent {
            token: leaf.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// Index an array slot resolves to, if reaching it stays within `limit`
fn check_slot(len: usize, token: &str, limit: usize) -> Result<usize, PatchError> {
    let index = if token == APPEND_MARKER {
        len
    } else {
        array_index(token).ok_or_else(|| PatchError::InvalidArrayIndex {
            token: token.to_string(),
        })?
    };
    if index.saturating_sub(len) > limit {
        return Err(PatchError::PaddingLimit { index, limit });
    }
    Ok(index)
}

fn walk_creating<'a>(
    document: &'a mut Value,
    parents: &[String],
    leaf: &str,
    limit: usize,
) -> Result<&'a mut Value, PatchError> {
    let mut current = document;
    for (i, token) in parents.iter().enumerate() {
        let next = parents.get(i + 1).map(String::as_str).unwrap_or(leaf);
        current = descend_or_create(current, token, next, limit)?;
    }
    if current.is_null() {
        *current = empty_container_for(leaf);
    }
    Ok(current)
}

fn descend_or_create<'a>(
    current: &'a mut Value,
    token: &str,
    next: &str,
    limit: usize,
) -> Result<&'a mut Value, PatchError> {
    if current.is_null() {
        *current = empty_container_for(token);
    }
    let child = match current {
        Value::Object(map) => map.entry(token.to_string()).or_insert(Value::Null),
        Value::Array(items) => {
            let index = if token == APPEND_MARKER {
                items.len()
            } else {
                array_index(token).ok_or_else(|| PatchError::InvalidArrayIndex {
                    token: token.to_string(),
                })?
            };
            if index >= items.len() {
                pad(items, index, limit)?;
                items.push(Value::Null);
            }
            &mut items[index]
        }
        _ => {
            return Err(PatchError::ScalarParent {
                token: token.to_string(),
            })
        }
    };
    if child.is_null() {
        *child = empty_container_for(next);
    }
    Ok(child)
}

fn empty_container_for(token: &str) -> Value {
    if is_array_token(token) {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn pad(items: &mut Vec<Value>, index: usize, limit: usize) -> Result<(), PatchError> {
    let missing = index.saturating_sub(items.len());
    if missing > limit {
        return Err(PatchError::PaddingLimit { index, limit });
    }
    items.resize(items.len() + missing, Value::Null);
    Ok(())
}
