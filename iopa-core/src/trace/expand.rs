//! Stage expansion
//!
//! Expansion turns the relative deltas of a [`TraceRecord`] into absolute
//! snapshots at every checkpoint, plus an isolated before/after pair for the
//! `next` and `end` deltas:
//!
//! ```text
//! next == true                          next == false
//! ────────────                          ─────────────
//! startJson ─nextDelta──► nextJson      startJson ─endDelta──► endJson
//! nextJson  ─resumeDelta► resumeJson
//! resumeJson─endDelta───► endJson
//! ```

use serde::Serialize;
use serde_json::Value;

use super::isolate::{isolated_diff, IsolatedDiff};
use super::record::{Phase, Trace, TraceRecord};
use crate::config::ReconstructConfig;
use crate::error::{InspectorError, Result};
use crate::patch::{apply_patch, Delta, PatchError, PatchReport};

/// Per-phase operation outcomes of one expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    next: Option<PatchReport>,
    resume: Option<PatchReport>,
    end: PatchReport,
}

impl ExpansionReport {
    /// Report of a phase; `None` for phases that did not run
    pub fn phase(&self, phase: Phase) -> Option<&PatchReport> {
        match phase {
            Phase::Next => self.next.as_ref(),
            Phase::Resume => self.resume.as_ref(),
            Phase::End => Some(&self.end),
        }
    }

    /// True when every operation of every phase was valid
    pub fn is_clean(&self) -> bool {
        Phase::ALL
            .iter()
            .filter_map(|phase| self.phase(*phase))
            .all(PatchReport::is_clean)
    }

    /// Skipped operations with their phase and delta index
    pub fn malformed(&self) -> impl Iterator<Item = (Phase, usize, &PatchError)> {
        Phase::ALL.into_iter().flat_map(move |phase| {
            self.phase(phase)
                .into_iter()
                .flat_map(move |report| report.malformed().map(move |(i, err)| (phase, i, err)))
        })
    }
}

/// Borrowed before/after pair for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiffView<'a> {
    pub before: &'a Value,
    pub after: &'a Value,
}

/// A trace record with every checkpoint reconstructed
///
/// Serializes as the original record's camelCase fields followed by the
/// derived ones. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedTraceRecord {
    #[serde(flatten)]
    pub record: TraceRecord,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_json: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_json: Option<Value>,

    pub end_json: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_json_diffs_for_next: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_json_diffs: Option<Value>,

    pub start_json_diffs_for_end: Value,

    pub end_json_diffs: Value,

    #[serde(skip)]
    report: ExpansionReport,
}

impl ExpandedTraceRecord {
    /// Outcome of every applied operation
    pub fn report(&self) -> &ExpansionReport {
        &self.report
    }

    /// Snapshot at stage entry
    pub fn start_json(&self) -> &Value {
        &self.record.start_json
    }

    /// Snapshot after the given phase
    pub fn json_after(&self, phase: Phase) -> Option<&Value> {
        match phase {
            Phase::Next => self.next_json.as_ref(),
            Phase::Resume => self.resume_json.as_ref(),
            Phase::End => Some(&self.end_json),
        }
    }

    /// Isolated before/after pair for a phase that has changes
    ///
    /// Only `next` and `end` deltas are isolated. A phase whose delta is
    /// present but empty (`[]`) counts as unchanged and yields `None` rather
    /// than an empty before/after pair.
    pub fn diff(&self, phase: Phase) -> Option<DiffView<'_>> {
        if !self.record.has_changes(phase) {
            return None;
        }
        match phase {
            Phase::Next => Some(DiffView {
                before: self.start_json_diffs_for_next.as_ref()?,
                after: self.next_json_diffs.as_ref()?,
            }),
            Phase::End => Some(DiffView {
                before: &self.start_json_diffs_for_end,
                after: &self.end_json_diffs,
            }),
            Phase::Resume => None,
        }
    }
}

/// Reconstruct every checkpoint of a record
///
/// With the default configuration this never fails: malformed operations are
/// skipped and reported. With `strict_paths` the first malformed operation is
/// returned as [`InspectorError::MalformedPatch`].
pub fn expand(record: &TraceRecord, config: &ReconstructConfig) -> Result<ExpandedTraceRecord> {
    let expanded = expand_lenient(record, config);

    if config.strict_paths {
        if let Some((phase, index, err)) = expanded.report.malformed().next() {
            return Err(InspectorError::MalformedPatch {
                phase: phase.to_string(),
                index,
                source: err.clone(),
            });
        }
    }

    Ok(expanded)
}

impl Trace {
    /// Expand the stage at `index`
    pub fn expand(&self, index: usize, config: &ReconstructConfig) -> Result<ExpandedTraceRecord> {
        let stage = self
            .stages()
            .get(index)
            .ok_or_else(|| InspectorError::StageNotFound {
                stage: format!("#{}", index),
            })?;
        expand(&stage.record, config)
    }

    /// Expand the first stage called `name`
    pub fn expand_stage(&self, name: &str, config: &ReconstructConfig) -> Result<ExpandedTraceRecord> {
        let stage = self.get(name).ok_or_else(|| InspectorError::StageNotFound {
            stage: name.to_string(),
        })?;
        expand(&stage.record, config)
    }

    /// Expand every stage in order
    pub fn expand_all(&self, config: &ReconstructConfig) -> Result<Vec<(String, ExpandedTraceRecord)>> {
        self.stages()
            .iter()
            .map(|stage| Ok((stage.name.clone(), expand(&stage.record, config)?)))
            .collect()
    }
}

fn expand_lenient(record: &TraceRecord, config: &ReconstructConfig) -> ExpandedTraceRecord {
    let empty = Delta::new();
    let delta = |phase: Phase| record.delta(phase).unwrap_or(&empty);

    if record.next {
        let next = apply_patch(&record.start_json, delta(Phase::Next), config);
        let resume = apply_patch(&next.document, delta(Phase::Resume), config);
        let end = apply_patch(&resume.document, delta(Phase::End), config);

        let next_diff = isolated_diff(&record.start_json, delta(Phase::Next), config);
        let end_diff = isolated_diff(&resume.document, delta(Phase::End), config);

        ExpandedTraceRecord {
            record: record.clone(),
            next_json: Some(next.document),
            resume_json: Some(resume.document),
            end_json: end.document,
            start_json_diffs_for_next: Some(next_diff.before),
            next_json_diffs: Some(next_diff.after),
            start_json_diffs_for_end: end_diff.before,
            end_json_diffs: end_diff.after,
            report: ExpansionReport {
                next: Some(next.report),
                resume: Some(resume.report),
                end: end.report,
            },
        }
    } else {
        let end = apply_patch(&record.start_json, delta(Phase::End), config);
        let IsolatedDiff { before, after } =
            isolated_diff(&record.start_json, delta(Phase::End), config);

        ExpandedTraceRecord {
            record: record.clone(),
            next_json: None,
            resume_json: None,
            end_json: end.document,
            start_json_diffs_for_next: None,
            next_json_diffs: None,
            start_json_diffs_for_end: before,
            end_json_diffs: after,
            report: ExpansionReport {
                next: None,
                resume: None,
                end: end.report,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{OpOutcome, PatchOperation};
    use serde_json::json;

    fn record(value: Value) -> TraceRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_simple_end_delta() {
        let rec = record(json!({
            "started": 0, "duration": 1, "next": false,
            "startJson": {"a": 1},
            "endDelta": [{"op": "replace", "path": "/a", "value": 2}]
        }));
        let expanded = expand(&rec, &ReconstructConfig::default()).unwrap();

        assert_eq!(expanded.end_json, json!({"a": 2}));
        assert_eq!(expanded.start_json_diffs_for_end, json!({"a": 1}));
        assert_eq!(expanded.end_json_diffs, json!({"a": 2}));
        assert!(expanded.next_json.is_none());
        assert!(expanded.resume_json.is_none());
        assert!(expanded.report().phase(Phase::Next).is_none());
    }

    #[test]
    fn test_next_resume_end_chain() {
        let rec = record(json!({
            "started": 0, "duration": 5, "next": true, "nextDuration": 2, "resumed": 4,
            "startJson": {"a": 1},
            "nextDelta": [{"op": "add", "path": "/b", "value": 2}],
            "resumeDelta": [{"op": "replace", "path": "/b", "value": 3}],
            "endDelta": [{"op": "remove", "path": "/a"}]
        }));
        let expanded = expand(&rec, &ReconstructConfig::default()).unwrap();

        assert_eq!(expanded.next_json, Some(json!({"a": 1, "b": 2})));
        assert_eq!(expanded.resume_json, Some(json!({"a": 1, "b": 3})));
        assert_eq!(expanded.end_json, json!({"b": 3}));
        assert_eq!(expanded.start_json_diffs_for_next, Some(json!({})));
        assert_eq!(expanded.next_json_diffs, Some(json!({"b": 2})));
        assert_eq!(expanded.start_json_diffs_for_end, json!({"a": 1}));
        assert_eq!(expanded.end_json_diffs, json!({}));
        assert!(expanded.report().is_clean());
    }

    #[test]
    fn test_deltas_ignored_without_next() {
        let rec = record(json!({
            "started": 0, "duration": 1, "next": false,
            "startJson": {"a": 1},
            "nextDelta": [{"op": "add", "path": "/b", "value": 2}]
        }));
        let expanded = expand(&rec, &ReconstructConfig::default()).unwrap();
        assert_eq!(expanded.end_json, json!({"a": 1}));
        assert!(expanded.diff(Phase::Next).is_none());
        assert!(expanded.diff(Phase::End).is_none());
    }

    #[test]
    fn test_end_isolated_against_resume_state() {
        let rec = TraceRecord::new(0.0, json!({"n": 0}), 1.0)
            .with_next(0.5, Delta::from(vec![PatchOperation::replace("/n", json!(1))]))
            .with_resume(0.8, Delta::from(vec![PatchOperation::replace("/n", json!(2))]))
            .with_end(Delta::from(vec![PatchOperation::replace("/n", json!(3))]));
        let expanded = expand(&rec, &ReconstructConfig::default()).unwrap();

        let end = expanded.diff(Phase::End).unwrap();
        assert_eq!(end.before, &json!({"n": 2}));
        assert_eq!(end.after, &json!({"n": 3}));

        let next = expanded.diff(Phase::Next).unwrap();
        assert_eq!(next.before, &json!({"n": 0}));
        assert_eq!(next.after, &json!({"n": 1}));

        assert!(expanded.diff(Phase::Resume).is_none());
        assert_eq!(expanded.json_after(Phase::Resume), Some(&json!({"n": 2})));
    }

    #[test]
    fn test_malformed_operations_are_reported() {
        let rec = record(json!({
            "started": 0, "duration": 1,
            "startJson": {"a": 1},
            "endDelta": [
                {"op": "replace", "path": "a", "value": 2},
                {"op": "replace", "path": "/a", "value": 3}
            ]
        }));
        let expanded = expand(&rec, &ReconstructConfig::default()).unwrap();
        assert_eq!(expanded.end_json, json!({"a": 3}));

        let report = expanded.report();
        assert!(!report.is_clean());
        let malformed: Vec<_> = report.malformed().map(|(phase, i, _)| (phase, i)).collect();
        assert_eq!(malformed, vec![(Phase::End, 0)]);
        assert_eq!(report.phase(Phase::End).unwrap().outcomes()[1], OpOutcome::Applied);
    }

    #[test]
    fn test_strict_mode_rejects_malformed_operations() {
        let rec = record(json!({
            "started": 0, "duration": 1, "next": true,
            "startJson": {},
            "nextDelta": [{"op": "add", "path": "", "value": 1}]
        }));
        let config = ReconstructConfig::builder().strict_paths(true).build();

        match expand(&rec, &config) {
            Err(InspectorError::MalformedPatch { phase, index, source }) => {
                assert_eq!(phase, "next");
                assert_eq!(index, 0);
                assert_eq!(source, PatchError::EmptyPath);
            }
            other => panic!("expected MalformedPatch, got {:?}", other),
        }
    }

    #[test]
    fn test_camel_case_serialization() {
        let rec = TraceRecord::new(1.0, json!({"a": 1}), 2.0)
            .with_end(Delta::from(vec![PatchOperation::add("/b", json!(true))]));
        let expanded = expand(&rec, &ReconstructConfig::default()).unwrap();

        let value = serde_json::to_value(&expanded).unwrap();
        assert_eq!(value["startJson"], json!({"a": 1}));
        assert_eq!(value["endJson"], json!({"a": 1, "b": true}));
        assert_eq!(value["startJsonDiffsForEnd"], json!({}));
        assert_eq!(value["endJsonDiffs"], json!({"b": true}));
        assert!(value.get("nextJson").is_none());
        assert!(value.get("report").is_none());
    }

    #[test]
    fn test_trace_expansion_lookup() {
        let trace = Trace::from_value(json!([
            ["a", {"started": 0, "duration": 1, "startJson": {"x": 1},
                   "endDelta": [{"op": "replace", "path": "/x", "value": 2}]}],
            ["b", {"started": 1, "duration": 1, "startJson": {"x": 2}}]
        ]))
        .unwrap();
        let config = ReconstructConfig::default();

        assert_eq!(trace.expand(0, &config).unwrap().end_json, json!({"x": 2}));
        assert_eq!(trace.expand_stage("b", &config).unwrap().end_json, json!({"x": 2}));

        let err = trace.expand(5, &config).unwrap_err();
        assert_eq!(err.error_code(), "STAGE_NOT_FOUND");
        assert!(trace.expand_stage("c", &config).is_err());

        let all = trace.expand_all(&config).unwrap();
        let names: Vec<_> = all.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
