//! Middleware trace data model

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{format_duration, KeyValueItem};
use crate::error::{InspectorError, Result};
use crate::patch::Delta;

/// Delta phase of a middleware stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Changes made before the stage called `next()`
    Next,
    /// Changes made after downstream middleware returned
    Resume,
    /// Changes made up to stage completion
    End,
}

impl Phase {
    /// All phases in reconstruction order
    pub const ALL: [Phase; 3] = [Phase::Next, Phase::Resume, Phase::End];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Next => "next",
            Phase::Resume => "resume",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one middleware stage did to the request context
///
/// `start_json` is the full context as the stage received it. The deltas are
/// relative: `next_delta` to `start_json`, `resume_delta` to the state after
/// `next_delta`, and `end_delta` to the state after `resume_delta` (or to
/// `start_json` when the stage never called `next()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    /// Stage entry timestamp in milliseconds
    pub started: f64,

    /// Snapshot of the context at stage entry
    #[serde(default)]
    pub start_json: Value,

    /// Total stage duration in milliseconds
    pub duration: f64,

    /// Whether the stage handed control to the next middleware
    #[serde(default)]
    pub next: bool,

    /// Time until `next()` was called
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_duration: Option<f64>,

    /// Timestamp at which control came back to the stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_delta: Option<Delta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_delta: Option<Delta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_delta: Option<Delta>,
}

impl TraceRecord {
    /// A record for a stage that completed without calling `next()`
    pub fn new(started: f64, start_json: Value, duration: f64) -> Self {
        Self {
            started,
            start_json,
            duration,
            next: false,
            next_duration: None,
            resumed: None,
            next_delta: None,
            resume_delta: None,
            end_delta: None,
        }
    }

    /// Mark the stage as having called `next()` with the given delta
    pub fn with_next(mut self, next_duration: f64, delta: Delta) -> Self {
        self.next = true;
        self.next_duration = Some(next_duration);
        self.next_delta = Some(delta);
        self
    }

    /// Record the changes made after control came back
    pub fn with_resume(mut self, resumed: f64, delta: Delta) -> Self {
        self.resumed = Some(resumed);
        self.resume_delta = Some(delta);
        self
    }

    pub fn with_end(mut self, delta: Delta) -> Self {
        self.end_delta = Some(delta);
        self
    }

    /// Delta captured for a phase, if any
    pub fn delta(&self, phase: Phase) -> Option<&Delta> {
        match phase {
            Phase::Next => self.next_delta.as_ref(),
            Phase::Resume => self.resume_delta.as_ref(),
            Phase::End => self.end_delta.as_ref(),
        }
    }

    /// True when the phase has at least one entry to apply
    pub fn has_changes(&self, phase: Phase) -> bool {
        self.delta(phase).is_some_and(|delta| !delta.is_empty())
    }
}

/// A named stage of a trace
///
/// Serialized as a `[name, record]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, TraceRecord)", into = "(String, TraceRecord)")]
pub struct TraceStage {
    pub name: String,
    pub record: TraceRecord,
}

impl TraceStage {
    pub fn new(name: impl Into<String>, record: TraceRecord) -> Self {
        Self {
            name: name.into(),
            record,
        }
    }
}

impl From<(String, TraceRecord)> for TraceStage {
    fn from((name, record): (String, TraceRecord)) -> Self {
        Self { name, record }
    }
}

impl From<TraceStage> for (String, TraceRecord) {
    fn from(stage: TraceStage) -> Self {
        (stage.name, stage.record)
    }
}

/// Ordered middleware trace of one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    stages: Vec<TraceStage>,
}

impl Trace {
    pub fn new(stages: Vec<TraceStage>) -> Self {
        Self { stages }
    }

    /// Parse a serialized trace
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Convert a trace value such as the `server.Trace` field of a request
    pub fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Array(items) => {
                if let Some((index, _)) = items
                    .iter()
                    .enumerate()
                    .find(|(_, item)| !matches!(item, Value::Array(pair) if pair.len() == 2))
                {
                    return Err(InspectorError::InvalidTrace {
                        reason: format!("entry {} is not a [name, record] pair", index),
                    });
                }
            }
            other => {
                return Err(InspectorError::InvalidTrace {
                    reason: format!("expected an array, found {}", json_type_name(other)),
                });
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn stages(&self) -> &[TraceStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// First stage with the given name
    pub fn get(&self, name: &str) -> Option<&TraceStage> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    /// Index of the first stage with the given name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|stage| stage.name == name)
    }

    /// Append a stage
    pub fn push(&mut self, stage: TraceStage) {
        self.stages.push(stage);
    }

    /// Sum of all stage durations in milliseconds
    pub fn total_duration(&self) -> f64 {
        self.stages.iter().map(|stage| stage.record.duration).sum()
    }

    /// Middleware table rows: stage name and its duration
    pub fn rows(&self) -> Vec<KeyValueItem> {
        self.stages
            .iter()
            .map(|stage| {
                KeyValueItem::new(
                    stage.name.clone(),
                    Value::String(format_duration(stage.record.duration)),
                )
            })
            .collect()
    }
}

impl FromIterator<TraceStage> for Trace {
    fn from_iter<I: IntoIterator<Item = TraceStage>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
