//! Result records and the identifier-keyed result set.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answer::AnswerType;
use crate::ids::{RunId, StepId};

/// The recorded answer to a single input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    /// Input field identifier.
    pub identifier: String,

    /// Shape of `value`.
    pub answer_type: AnswerType,

    /// JSON-compatible answer; `null` when no answer was given.
    pub value: Value,

    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl AnswerResult {
    /// Create an answer result stamped with the current time.
    pub fn new(identifier: impl Into<String>, answer_type: AnswerType, value: Value) -> Self {
        let now = Utc::now();
        Self {
            identifier: identifier.into(),
            answer_type,
            value,
            start_date: now,
            end_date: now,
        }
    }

    /// Builder method to set the start date.
    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = start_date;
        self
    }
}

/// Result of a step that records no answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub identifier: StepId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl StepResult {
    pub fn new(identifier: StepId, start_date: DateTime<Utc>) -> Self {
        Self {
            identifier,
            start_date,
            end_date: Utc::now(),
        }
    }
}

/// Result of a form step: one answer per input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResult {
    pub identifier: StepId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub input_results: Vec<AnswerResult>,
}

impl CollectionResult {
    pub fn new(identifier: StepId, start_date: DateTime<Utc>, input_results: Vec<AnswerResult>) -> Self {
        Self {
            identifier,
            start_date,
            end_date: Utc::now(),
            input_results,
        }
    }

    pub fn answer(&self, identifier: &str) -> Option<&AnswerResult> {
        self.input_results.iter().find(|r| r.identifier == identifier)
    }
}

/// An entry in a result set's step history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResultRecord {
    Step(StepResult),
    Answer(AnswerResult),
    Collection(CollectionResult),
    Section(TaskResult),
}

impl ResultRecord {
    pub fn identifier(&self) -> &str {
        match self {
            Self::Step(r) => r.identifier.as_str(),
            Self::Answer(r) => &r.identifier,
            Self::Collection(r) => r.identifier.as_str(),
            Self::Section(r) => &r.identifier,
        }
    }
}

/// Where an answer lives inside the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Record(usize),
    Nested(usize, usize),
}

/// Ordered, identifier-keyed collection of results for one step collection.
///
/// Identifiers are unique within one result set. Appending a record whose
/// identifier is already present drops that record and everything after it,
/// because the path from that step is being walked again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TaskResultData")]
pub struct TaskResult {
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,

    pub start_date: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    /// Schema metadata of the task that produced this result.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub schema_info: HashMap<String, String>,

    step_history: Vec<ResultRecord>,

    #[serde(skip)]
    records: HashMap<String, usize>,

    #[serde(skip)]
    answers: HashMap<String, Location>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultData {
    identifier: String,
    #[serde(default)]
    run_id: Option<RunId>,
    start_date: DateTime<Utc>,
    #[serde(default)]
    end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    schema_info: HashMap<String, String>,
    #[serde(default)]
    step_history: Vec<ResultRecord>,
}

impl From<TaskResultData> for TaskResult {
    fn from(data: TaskResultData) -> Self {
        let mut result = TaskResult {
            identifier: data.identifier,
            run_id: data.run_id,
            start_date: data.start_date,
            end_date: data.end_date,
            schema_info: data.schema_info,
            step_history: data.step_history,
            records: HashMap::new(),
            answers: HashMap::new(),
        };
        result.rebuild_index();
        result
    }
}

impl PartialEq for TaskResult {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.run_id == other.run_id
            && self.start_date == other.start_date
            && self.end_date == other.end_date
            && self.schema_info == other.schema_info
            && self.step_history == other.step_history
    }
}

impl TaskResult {
    /// Create an empty result set.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            run_id: None,
            start_date: Utc::now(),
            end_date: None,
            schema_info: HashMap::new(),
            step_history: Vec::new(),
            records: HashMap::new(),
            answers: HashMap::new(),
        }
    }

    /// Builder method to set the run this result belongs to.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Builder method to attach schema metadata.
    pub fn with_schema_info(mut self, schema_info: HashMap<String, String>) -> Self {
        self.schema_info = schema_info;
        self
    }

    /// Records in the order they were appended.
    pub fn step_history(&self) -> &[ResultRecord] {
        &self.step_history
    }

    pub fn is_empty(&self) -> bool {
        self.step_history.is_empty()
    }

    /// Append a record, replacing any existing record with the same
    /// identifier along with everything recorded after it.
    pub fn append(&mut self, record: ResultRecord) {
        if let Some(&position) = self.records.get(record.identifier()) {
            self.step_history.truncate(position);
            self.rebuild_index();
        }
        self.step_history.push(record);
        self.index_record(self.step_history.len() - 1);
    }

    /// Look up a record by identifier.
    pub fn record(&self, identifier: &str) -> Option<&ResultRecord> {
        self.records
            .get(identifier)
            .and_then(|&position| self.step_history.get(position))
    }

    /// Look up an answer by input field identifier, including answers
    /// nested in form collections and, failing that, in sections.
    pub fn answer(&self, identifier: &str) -> Option<&AnswerResult> {
        match self.answers.get(identifier) {
            Some(&Location::Record(position)) => match self.step_history.get(position) {
                Some(ResultRecord::Answer(answer)) => Some(answer),
                _ => None,
            },
            Some(&Location::Nested(position, inner)) => match self.step_history.get(position) {
                Some(ResultRecord::Collection(collection)) => collection.input_results.get(inner),
                _ => None,
            },
            None => self.step_history.iter().rev().find_map(|record| match record {
                ResultRecord::Section(section) => section.answer(identifier),
                _ => None,
            }),
        }
    }

    /// Mark the result set finished.
    pub fn finish(&mut self) {
        self.end_date = Some(Utc::now());
    }

    fn rebuild_index(&mut self) {
        self.records.clear();
        self.answers.clear();
        for position in 0..self.step_history.len() {
            self.index_record(position);
        }
    }

    fn index_record(&mut self, position: usize) {
        let record = &self.step_history[position];
        self.records.insert(record.identifier().to_string(), position);
        match record {
            ResultRecord::Answer(answer) => {
                self.answers
                    .insert(answer.identifier.clone(), Location::Record(position));
            }
            ResultRecord::Collection(collection) => {
                for (inner, answer) in collection.input_results.iter().enumerate() {
                    self.answers
                        .insert(answer.identifier.clone(), Location::Nested(position, inner));
                }
            }
            ResultRecord::Step(_) | ResultRecord::Section(_) => {}
        }
    }
}

/// Read access to recorded results used by navigation decisions.
pub trait ResultLookup {
    /// Find the most relevant answer for an input field identifier.
    fn answer(&self, identifier: &str) -> Option<&AnswerResult>;

    /// Identifiers of the current step collection's history, oldest first.
    fn history_identifiers(&self) -> Vec<&str>;
}

impl ResultLookup for TaskResult {
    fn answer(&self, identifier: &str) -> Option<&AnswerResult> {
        TaskResult::answer(self, identifier)
    }

    fn history_identifiers(&self) -> Vec<&str> {
        self.step_history.iter().map(ResultRecord::identifier).collect()
    }
}

/// Chain of result sets from the outermost task down to the current
/// section. Answers resolve innermost first; history is the innermost one.
#[derive(Debug, Clone, Copy)]
pub struct ScopedResults<'a> {
    current: &'a TaskResult,
    ancestors: &'a [TaskResult],
}

impl<'a> ScopedResults<'a> {
    /// `ancestors` are ordered outermost first.
    pub fn new(current: &'a TaskResult, ancestors: &'a [TaskResult]) -> Self {
        Self { current, ancestors }
    }
}

impl ResultLookup for ScopedResults<'_> {
    fn answer(&self, identifier: &str) -> Option<&AnswerResult> {
        self.current
            .answer(identifier)
            .or_else(|| self.ancestors.iter().rev().find_map(|r| r.answer(identifier)))
    }

    fn history_identifiers(&self) -> Vec<&str> {
        self.current.history_identifiers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::BaseType;
    use serde_json::json;

    fn answer(id: &str, value: Value) -> AnswerResult {
        AnswerResult::new(id, AnswerType::new(BaseType::Integer), value)
    }

    fn step(id: &str) -> ResultRecord {
        ResultRecord::Step(StepResult::new(StepId::new(id), Utc::now()))
    }

    #[test]
    fn test_lookup_nested_answer() {
        let mut result = TaskResult::new("task");
        result.append(step("intro"));
        result.append(ResultRecord::Collection(CollectionResult::new(
            StepId::new("form"),
            Utc::now(),
            vec![answer("age", json!(30)), answer("height", json!(180))],
        )));

        assert_eq!(result.answer("height").map(|a| &a.value), Some(&json!(180)));
        assert!(result.record("intro").is_some());
        assert!(result.answer("intro").is_none());
    }

    #[test]
    fn test_append_existing_truncates() {
        let mut result = TaskResult::new("task");
        result.append(step("a"));
        result.append(ResultRecord::Answer(answer("b", json!(1))));
        result.append(step("c"));

        result.append(ResultRecord::Answer(answer("b", json!(2))));

        assert_eq!(result.history_identifiers(), vec!["a", "b"]);
        assert!(result.record("c").is_none());
        assert_eq!(result.answer("b").map(|a| &a.value), Some(&json!(2)));
    }

    #[test]
    fn test_section_answers_are_visible() {
        let mut section = TaskResult::new("section");
        section.append(ResultRecord::Answer(answer("inner", json!(5))));

        let mut result = TaskResult::new("task");
        result.append(ResultRecord::Section(section));

        assert_eq!(result.answer("inner").map(|a| &a.value), Some(&json!(5)));
    }

    #[test]
    fn test_scoped_lookup_prefers_innermost() {
        let mut outer = TaskResult::new("task");
        outer.append(ResultRecord::Answer(answer("q", json!(1))));
        outer.append(ResultRecord::Answer(answer("only_outer", json!(9))));
        let mut inner = TaskResult::new("section");
        inner.append(ResultRecord::Answer(answer("q", json!(2))));

        let ancestors = vec![outer];
        let scoped = ScopedResults::new(&inner, &ancestors);
        assert_eq!(scoped.answer("q").map(|a| &a.value), Some(&json!(2)));
        assert_eq!(scoped.answer("only_outer").map(|a| &a.value), Some(&json!(9)));
        assert_eq!(scoped.history_identifiers(), vec!["q"]);
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let mut result = TaskResult::new("task");
        result.append(ResultRecord::Answer(answer("q", json!(3))));

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""type":"answer""#));
        let back: TaskResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.answer("q").map(|a| &a.value), Some(&json!(3)));
    }
}
