//! Trace reconstruction against captured middleware traces.

use iopa_core::patch::{apply_patch, OpOutcome};
use iopa_core::trace::isolated_diff;
use iopa_core::{Delta, Phase, PatchOperation, ReconstructConfig, Trace};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn trace(value: Value) -> Trace {
    Trace::from_value(value).expect("valid trace")
}

#[test]
fn test_end_only_stage() {
    let trace = trace(json!([
        ["setStatus", {
            "started": 0,
            "startJson": {"a": 1},
            "duration": 5,
            "next": false,
            "endDelta": [{"op": "replace", "path": "/a", "value": 2}]
        }]
    ]));

    let expanded = trace.expand(0, &ReconstructConfig::default()).unwrap();
    assert_eq!(expanded.end_json, json!({"a": 2}));
    assert_eq!(expanded.start_json_diffs_for_end, json!({"a": 1}));
    assert_eq!(expanded.end_json_diffs, json!({"a": 2}));
    assert!(expanded.next_json.is_none());
    assert!(expanded.resume_json.is_none());
}

#[test]
fn test_stage_calling_next() {
    let trace = trace(json!([
        ["session", {
            "started": 0,
            "startJson": {"a": 1},
            "duration": 9,
            "next": true,
            "nextDuration": 4,
            "resumed": 6,
            "nextDelta": [{"op": "add", "path": "/b", "value": 2}],
            "resumeDelta": [],
            "endDelta": [{"op": "remove", "path": "/a"}]
        }]
    ]));

    let expanded = trace.expand_stage("session", &ReconstructConfig::default()).unwrap();
    assert_eq!(expanded.next_json, Some(json!({"a": 1, "b": 2})));
    assert_eq!(expanded.resume_json, Some(json!({"a": 1, "b": 2})));
    assert_eq!(expanded.end_json, json!({"b": 2}));

    let next = expanded.diff(Phase::Next).unwrap();
    assert_eq!(next.before, &json!({}));
    assert_eq!(next.after, &json!({"b": 2}));

    let end = expanded.diff(Phase::End).unwrap();
    assert_eq!(end.before, &json!({"a": 1}));
    assert_eq!(end.after, &json!({}));
}

#[test]
fn test_absent_and_empty_deltas_change_nothing() {
    let start = json!({"iopa.Method": "GET", "nested": {"list": [1, 2]}});
    let trace = trace(json!([
        ["absent", {"started": 0, "duration": 1, "next": true, "startJson": start}],
        ["empty", {
            "started": 1,
            "duration": 1,
            "next": true,
            "startJson": start,
            "nextDelta": [],
            "resumeDelta": [],
            "endDelta": []
        }]
    ]));

    for (name, expanded) in trace.expand_all(&ReconstructConfig::default()).unwrap() {
        assert_eq!(expanded.next_json.as_ref(), Some(&start), "{}", name);
        assert_eq!(expanded.resume_json.as_ref(), Some(&start), "{}", name);
        assert_eq!(expanded.end_json, start, "{}", name);
        for phase in Phase::ALL {
            assert!(expanded.diff(phase).is_none(), "{} {}", name, phase);
        }
    }
}

#[test]
fn test_append_marker() {
    let trace = trace(json!([
        ["push", {
            "started": 0,
            "duration": 1,
            "startJson": {"items": [1]},
            "endDelta": [{"op": "add", "path": "/items/-", "value": 2}]
        }]
    ]));

    let expanded = trace.expand(0, &ReconstructConfig::default()).unwrap();
    assert_eq!(expanded.end_json, json!({"items": [1, 2]}));
    assert!(expanded.report().is_clean());
}

#[test]
fn test_stages_keep_capture_order() {
    let trace = trace(json!([
        ["zeta", {"started": 0, "duration": 3, "startJson": {}}],
        ["alpha", {"started": 1, "duration": 2, "startJson": {}}],
        ["mid", {"started": 2, "duration": 1, "startJson": {}}]
    ]));

    let names: Vec<String> = trace
        .expand_all(&ReconstructConfig::default())
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    assert_eq!(trace.total_duration(), 6.0);
}

#[test]
fn test_operations_apply_in_order() {
    let config = ReconstructConfig::default();
    let forward = Delta::from(vec![
        PatchOperation::add("/a", json!(1)),
        PatchOperation::replace("/a", json!(2)),
    ]);
    let backward = Delta::from(vec![
        PatchOperation::replace("/a", json!(2)),
        PatchOperation::add("/a", json!(1)),
    ]);

    assert_eq!(apply_patch(&json!({}), &forward, &config).document, json!({"a": 2}));
    assert_eq!(apply_patch(&json!({}), &backward, &config).document, json!({"a": 1}));
}

#[test]
fn test_start_json_is_not_modified() {
    let trace = trace(json!([
        ["mutate", {
            "started": 0,
            "duration": 1,
            "next": true,
            "startJson": {"a": {"b": [1, 2, 3]}},
            "nextDelta": [{"op": "remove", "path": "/a/b/0"}],
            "endDelta": [{"op": "replace", "path": "/a", "value": null}]
        }]
    ]));
    let before = trace.clone();

    let expanded = trace.expand(0, &ReconstructConfig::default()).unwrap();
    assert_eq!(trace, before);
    assert_eq!(expanded.start_json(), &json!({"a": {"b": [1, 2, 3]}}));
    assert_eq!(expanded.end_json, json!({"a": null}));
}

#[test]
fn test_malformed_operations_are_reported() {
    let raw = json!([
        ["broken", {
            "started": 0,
            "duration": 1,
            "startJson": {"name": "x"},
            "endDelta": [
                {"op": "replace", "path": "name", "value": "y"},
                {"op": "add", "path": "/name/inner", "value": 1},
                {"op": "add", "path": "/ok", "value": true}
            ]
        }]
    ]);
    let trace = trace(raw);

    let lenient = trace.expand(0, &ReconstructConfig::default()).unwrap();
    assert_eq!(lenient.end_json, json!({"name": "x", "ok": true}));
    let outcomes = lenient.report().phase(Phase::End).unwrap().outcomes();
    assert!(outcomes[0].is_malformed());
    assert!(outcomes[1].is_malformed());
    assert_eq!(outcomes[2], OpOutcome::Applied);

    let strict = ReconstructConfig::builder().strict_paths(true).build();
    let err = trace.expand(0, &strict).unwrap_err();
    assert_eq!(err.error_code(), "MALFORMED_PATCH");
}

#[test]
fn test_unknown_stage() {
    let trace = trace(json!([["only", {"started": 0, "duration": 0, "startJson": {}}]]));
    let config = ReconstructConfig::default();
    assert_eq!(
        trace.expand_stage("other", &config).unwrap_err().error_code(),
        "STAGE_NOT_FOUND"
    );
    assert!(trace.expand(1, &config).is_err());
}

#[test]
fn test_expanded_record_wire_names() {
    let trace = trace(json!([
        ["s", {
            "started": 0,
            "duration": 1,
            "next": true,
            "nextDuration": 1,
            "resumed": 1,
            "startJson": {},
            "nextDelta": [{"op": "add", "path": "/x", "value": 1}]
        }]
    ]));
    let expanded = trace.expand(0, &ReconstructConfig::default()).unwrap();
    let value = serde_json::to_value(&expanded).unwrap();

    for key in [
        "started",
        "startJson",
        "nextJson",
        "resumeJson",
        "endJson",
        "startJsonDiffsForNext",
        "nextJsonDiffs",
        "startJsonDiffsForEnd",
        "endJsonDiffs",
    ] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_rejected_write_is_not_in_diff() {
    let trace = trace(json!([
        ["scalarParent", {
            "started": 0,
            "duration": 1,
            "next": false,
            "startJson": {"a": 5},
            "endDelta": [
                {"op": "add", "path": "/a/b", "value": 9},
                {"op": "add", "path": "/c", "value": 1}
            ]
        }]
    ]));

    let expanded = trace.expand(0, &ReconstructConfig::default()).unwrap();
    assert_eq!(expanded.end_json, json!({"a": 5, "c": 1}));
    let diff = expanded.diff(Phase::End).unwrap();
    assert_eq!(diff.before, &json!({}));
    assert_eq!(diff.after, &json!({"c": 1}));
    assert_eq!(diff.after.pointer("/a/b"), None);
}

#[test]
fn test_phases_chain_like_one_concatenated_delta() {
    let trace = trace(json!([
        ["session", {
            "started": 0,
            "duration": 4,
            "next": true,
            "nextDuration": 2,
            "resumed": 3,
            "startJson": {"iopa.Headers": {"accept": "*/*"}, "items": [1]},
            "nextDelta": [
                {"op": "add", "path": "/iopa.Headers/cookie", "value": "sid=1"},
                {"op": "add", "path": "/items/-", "value": 2}
            ],
            "resumeDelta": [{"op": "replace", "path": "/items/0", "value": 0}],
            "endDelta": [
                {"op": "remove", "path": "/iopa.Headers/cookie"},
                {"op": "add", "path": "/iopa.StatusCode", "value": 200}
            ]
        }]
    ]));
    let config = ReconstructConfig::default();
    let stage = &trace.stages()[0];
    let deltas: Vec<&Delta> = Phase::ALL
        .iter()
        .filter_map(|phase| stage.record.delta(*phase))
        .collect();

    let whole = apply_patch(&stage.record.start_json, &Delta::concat(deltas), &config);
    let expanded = trace.expand(0, &config).unwrap();
    assert_eq!(whole.document, expanded.end_json);
    assert_eq!(
        whole.document,
        json!({"iopa.Headers": {"accept": "*/*"}, "items": [0, 2], "iopa.StatusCode": 200})
    );
    assert_eq!(whole.report.outcomes().len(), 5);
    assert!(whole.report.is_clean());
}

const KEYS: [&str; 4] = ["a", "b", "c", "d"];

fn object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(prop::sample::select(KEYS.to_vec()), 0i64..5, 0..4).prop_map(|m| {
        Value::Object(
            m.into_iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect::<Map<String, Value>>(),
        )
    })
}

fn replace_or_remove() -> impl Strategy<Value = PatchOperation> {
    let key = prop::sample::select(KEYS.to_vec());
    prop_oneof![
        (key.clone(), 0i64..5).prop_map(|(k, v)| PatchOperation::replace(format!("/{}", k), json!(v))),
        key.prop_map(|k| PatchOperation::remove(format!("/{}", k))),
    ]
}

fn any_write() -> impl Strategy<Value = PatchOperation> {
    prop_oneof![
        replace_or_remove(),
        (prop::sample::select(KEYS.to_vec()), 0i64..5)
            .prop_map(|(k, v)| PatchOperation::add(format!("/{}", k), json!(v))),
    ]
}

const NESTED_KEYS: [&str; 2] = ["a", "b"];

/// Small ints, `null`, or one level of nested object
fn nested_object() -> impl Strategy<Value = Value> {
    let key = prop::sample::select(NESTED_KEYS.to_vec());
    let inner = prop::collection::btree_map(key.clone(), 0i64..3, 0..3).prop_map(|m| {
        Value::Object(m.into_iter().map(|(k, v)| (k.to_string(), json!(v))).collect())
    });
    let member = prop_oneof![(0i64..3).prop_map(|v| json!(v)), Just(Value::Null), inner];
    prop::collection::btree_map(key, member, 0..3)
        .prop_map(|m| Value::Object(m.into_iter().map(|(k, v)| (k.to_string(), v)).collect()))
}

/// Writes at depth one or two, some of them through scalar parents
fn nested_write() -> impl Strategy<Value = PatchOperation> {
    let key = prop::sample::select(NESTED_KEYS.to_vec());
    let path = prop_oneof![
        key.clone().prop_map(|k| format!("/{}", k)),
        (key.clone(), key).prop_map(|(k, j)| format!("/{}/{}", k, j)),
    ];
    let value = prop_oneof![(0i64..3).prop_map(|v| json!(v)), Just(json!({}))];
    (0..3u8, path, value).prop_map(|(kind, path, value)| match kind {
        0 => PatchOperation::add(path, value),
        1 => PatchOperation::replace(path, value),
        _ => PatchOperation::remove(path),
    })
}

proptest! {
    #[test]
    fn replace_and_remove_deltas_are_idempotent(
        base in object(),
        ops in prop::collection::vec(replace_or_remove(), 0..6),
    ) {
        let config = ReconstructConfig::default();
        let delta = Delta::from(ops);
        let once = apply_patch(&base, &delta, &config).document;
        let twice = apply_patch(&once, &delta, &config).document;
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn isolated_diff_agrees_with_full_patch(
        base in object(),
        ops in prop::collection::vec(any_write(), 0..6),
    ) {
        let config = ReconstructConfig::default();
        let delta = Delta::from(ops);
        let full = apply_patch(&base, &delta, &config).document;
        let diff = isolated_diff(&base, &delta, &config);

        for op in delta.operations() {
            let key = &op.path()[1..];
            prop_assert_eq!(full.get(key), diff.after.get(key));
        }
        let touched: Vec<&str> = delta.operations().map(|op| &op.path()[1..]).collect();
        for key in diff.after.as_object().unwrap().keys() {
            prop_assert!(touched.contains(&key.as_str()));
        }
    }

    #[test]
    fn isolated_diff_agrees_with_full_patch_on_nested_paths(
        base in nested_object(),
        ops in prop::collection::vec(nested_write(), 0..6),
    ) {
        let config = ReconstructConfig::default();
        let delta = Delta::from(ops);
        let full = apply_patch(&base, &delta, &config).document;
        let diff = isolated_diff(&base, &delta, &config);

        for op in delta.operations() {
            prop_assert_eq!(full.pointer(op.path()), diff.after.pointer(op.path()), "{}", op.path());
        }
        let touched: Vec<&str> = delta
            .operations()
            .filter_map(|op| op.path()[1..].split('/').next())
            .collect();
        for key in diff.after.as_object().unwrap().keys() {
            prop_assert!(touched.contains(&key.as_str()));
        }
    }

    #[test]
    fn expansion_never_modifies_the_record(
        base in object(),
        ops in prop::collection::vec(any_write(), 0..6),
    ) {
        let trace = Trace::from_value(json!([
            ["p", {"started": 0, "duration": 1, "startJson": base, "endDelta": Delta::from(ops)}]
        ])).unwrap();
        let copy = trace.clone();
        let _ = trace.expand(0, &ReconstructConfig::default()).unwrap();
        prop_assert_eq!(trace, copy);
    }
}
