//! Delta isolation
//!
//! A full before/after comparison of a large request context buries the few
//! fields a middleware touched. Isolation builds a minimal document holding
//! only the pre-images of the paths a delta writes, so that applying the same
//! delta to it yields an equally small "after" document.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ReconstructConfig;
use crate::patch::{
    apply_operation, prepare_parent, write_value, Delta, JsonPointer, OpOutcome, PatchOperation,
    WriteMode,
};

/// Before/after pair restricted to the paths a delta touches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsolatedDiff {
    pub before: Value,
    pub after: Value,
}

/// Build the minimal pre-image of `base` for the paths `delta` writes
///
/// - `replace` and `remove` copy the current value at the path (`null` when
///   absent)
/// - `add` only creates the containers leading to the path
/// - Other operations and unrecognized entries are ignored
/// - Operations the full patch would skip as malformed are ignored too
pub fn isolate(base: &Value, delta: &Delta, config: &ReconstructConfig) -> Value {
    skeleton(base, &applicable(base, delta, config), config)
}

/// Isolate `delta` against `base` and apply it to the result
///
/// Only the operations that apply cleanly to `base` are replayed, so a
/// change rejected by the full reconstruction never shows up here.
pub fn isolated_diff(base: &Value, delta: &Delta, config: &ReconstructConfig) -> IsolatedDiff {
    let ops = applicable(base, delta, config);
    let before = skeleton(base, &ops, config);
    let mut after = before.clone();
    for op in &ops {
        apply_operation(&mut after, op, config);
    }
    IsolatedDiff { before, after }
}

/// Operations of `delta` that are not malformed when applied to `base` in order
fn applicable<'a>(
    base: &Value,
    delta: &'a Delta,
    config: &ReconstructConfig,
) -> Vec<&'a PatchOperation> {
    let mut running = base.clone();
    delta
        .operations()
        .filter(|op| match apply_operation(&mut running, op, config) {
            OpOutcome::Malformed(err) => {
                debug!(path = op.path(), error = %err, "not isolating operation");
                false
            }
            _ => true,
        })
        .collect()
}

fn skeleton(base: &Value, ops: &[&PatchOperation], config: &ReconstructConfig) -> Value {
    let mut skeleton = match base {
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    };

    for &op in ops.iter().filter(|op| op.is_isolated()) {
        let pointer = match JsonPointer::parse(op.path()) {
            Ok(pointer) => pointer,
            Err(err) => {
                debug!(path = op.path(), error = %err, "not isolating operation");
                continue;
            }
        };

        let result = match op {
            PatchOperation::Add { .. } => {
                prepare_parent(&mut skeleton, &pointer, config.max_array_padding)
            }
            _ => {
                let before = pointer.get(base).cloned().unwrap_or(Value::Null);
                write_value(
                    &mut skeleton,
                    &pointer,
                    before,
                    WriteMode::Set,
                    config.max_array_padding,
                )
                .map(|_| ())
            }
        };

        if let Err(err) = result {
            debug!(path = %pointer, error = %err, "no pre-image for operation");
        }
    }

    skeleton
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::DeltaEntry;
    use serde_json::json;

    fn delta(ops: Value) -> Delta {
        serde_json::from_value(ops).unwrap()
    }

    #[test]
    fn test_replace_copies_pre_image() {
        let base = json!({"a": {"b": 1, "c": 2}, "d": 3});
        let diff = isolated_diff(
            &base,
            &delta(json!([{"op": "replace", "path": "/a/b", "value": 9}])),
            &ReconstructConfig::default(),
        );
        assert_eq!(diff.before, json!({"a": {"b": 1}}));
        assert_eq!(diff.after, json!({"a": {"b": 9}}));
    }

    #[test]
    fn test_add_creates_parent_only() {
        let base = json!({"a": 1, "h": {"x": "y"}});
        let diff = isolated_diff(
            &base,
            &delta(json!([{"op": "add", "path": "/h/z", "value": "w"}])),
            &ReconstructConfig::default(),
        );
        assert_eq!(diff.before, json!({"h": {}}));
        assert_eq!(diff.after, json!({"h": {"z": "w"}}));
    }

    #[test]
    fn test_remove_of_missing_value() {
        let base = json!({"a": 1});
        let diff = isolated_diff(
            &base,
            &delta(json!([{"op": "remove", "path": "/gone"}])),
            &ReconstructConfig::default(),
        );
        assert_eq!(diff.before, json!({"gone": null}));
        assert_eq!(diff.after, json!({}));
    }

    #[test]
    fn test_array_root_and_indices() {
        let base = json!(["a", "b", "c"]);
        let diff = isolated_diff(
            &base,
            &delta(json!([{"op": "replace", "path": "/2", "value": "z"}])),
            &ReconstructConfig::default(),
        );
        assert_eq!(diff.before, json!([null, null, "c"]));
        assert_eq!(diff.after, json!([null, null, "z"]));
    }

    #[test]
    fn test_skips_other_operations() {
        let base = json!({"a": 1, "b": 2});
        let mut d = delta(json!([
            {"op": "move", "from": "/a", "path": "/c"},
            {"op": "test", "path": "/b", "value": 2},
            {"op": "replace", "path": "bad", "value": 1}
        ]));
        d.push(PatchOperation::replace("/b", json!(5)));
        assert!(matches!(d.entries()[0], DeltaEntry::Op(_)));

        let skeleton = isolate(&base, &d, &ReconstructConfig::default());
        assert_eq!(skeleton, json!({"b": 2}));
    }

    #[test]
    fn test_rejected_operations_are_not_shown() {
        let base = json!({"a": 5, "xs": [1]});
        let d = delta(json!([
            {"op": "replace", "path": "/a/b", "value": 9},
            {"op": "add", "path": "/a/c", "value": 1},
            {"op": "add", "path": "/xs/name", "value": 1},
            {"op": "replace", "path": "/n", "value": 2}
        ]));
        let diff = isolated_diff(&base, &d, &ReconstructConfig::default());
        assert_eq!(diff.before, json!({"n": null}));
        assert_eq!(diff.after, json!({"n": 2}));
        assert_eq!(isolate(&base, &d, &ReconstructConfig::default()), diff.before);
    }

    #[test]
    fn test_earlier_operation_makes_later_path_valid() {
        let base = json!({"a": 5});
        let diff = isolated_diff(
            &base,
            &delta(json!([
                {"op": "replace", "path": "/a", "value": {}},
                {"op": "add", "path": "/a/b", "value": 9}
            ])),
            &ReconstructConfig::default(),
        );
        assert_eq!(diff.before, json!({"a": 5}));
        assert_eq!(diff.after, json!({"a": {"b": 9}}));
    }

    #[test]
    fn test_base_is_not_mutated() {
        let base = json!({"a": {"b": [1, 2]}});
        let snapshot = base.clone();
        let _ = isolated_diff(
            &base,
            &delta(json!([
                {"op": "remove", "path": "/a/b/0"},
                {"op": "add", "path": "/a/c", "value": true}
            ])),
            &ReconstructConfig::default(),
        );
        assert_eq!(base, snapshot);
    }
}
