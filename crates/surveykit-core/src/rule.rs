//! Conditional navigation rules.
//!
//! A rule is a small predicate tree over recorded answers plus the step to
//! jump to when it holds. Evaluation is total: a missing answer simply makes
//! `Equals`, `Exists` and `IsTrue` false.

use serde_json::Value;

use crate::ids::StepId;
use crate::result::ResultLookup;

/// Predicate over the answers recorded so far.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPredicate {
    /// The answer equals `value`. A sequence answer matches a scalar it contains.
    Equals { identifier: String, value: Value },
    /// An answer exists and is not `null`.
    Exists(String),
    /// The answer is boolean `true`.
    IsTrue(String),
    Not(Box<ResultPredicate>),
    All(Vec<ResultPredicate>),
    Any(Vec<ResultPredicate>),
}

impl ResultPredicate {
    pub fn equals(identifier: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            identifier: identifier.into(),
            value: value.into(),
        }
    }

    pub fn exists(identifier: impl Into<String>) -> Self {
        Self::Exists(identifier.into())
    }

    pub fn is_true(identifier: impl Into<String>) -> Self {
        Self::IsTrue(identifier.into())
    }

    pub fn negate(predicate: ResultPredicate) -> Self {
        Self::Not(Box::new(predicate))
    }

    /// Evaluate against the recorded answers.
    pub fn evaluate(&self, results: &dyn ResultLookup) -> bool {
        match self {
            Self::Equals { identifier, value } => results
                .answer(identifier)
                .map(|answer| json_matches(&answer.value, value))
                .unwrap_or(false),
            Self::Exists(identifier) => results
                .answer(identifier)
                .map(|answer| !answer.value.is_null())
                .unwrap_or(false),
            Self::IsTrue(identifier) => results
                .answer(identifier)
                .map(|answer| answer.value == Value::Bool(true))
                .unwrap_or(false),
            Self::Not(inner) => !inner.evaluate(results),
            Self::All(predicates) => predicates.iter().all(|p| p.evaluate(results)),
            Self::Any(predicates) => predicates.iter().any(|p| p.evaluate(results)),
        }
    }
}

/// Jump to `skip_to` when `predicate` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationRule {
    pub predicate: ResultPredicate,
    pub skip_to: StepId,
}

impl NavigationRule {
    pub fn new(predicate: ResultPredicate, skip_to: impl Into<StepId>) -> Self {
        Self {
            predicate,
            skip_to: skip_to.into(),
        }
    }
}

fn json_matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(items), expected) if !expected.is_array() => {
            items.iter().any(|item| json_matches(item, expected))
        }
        (actual, expected) => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerType, BaseType};
    use crate::result::{AnswerResult, ResultRecord, TaskResult};
    use serde_json::json;

    fn results(entries: &[(&str, Value)]) -> TaskResult {
        let mut result = TaskResult::new("task");
        for (id, value) in entries {
            result.append(ResultRecord::Answer(AnswerResult::new(
                *id,
                AnswerType::new(BaseType::String),
                value.clone(),
            )));
        }
        result
    }

    #[test]
    fn test_equals_normalizes_numbers() {
        let r = results(&[("count", json!(3))]);
        assert!(ResultPredicate::equals("count", 3.0).evaluate(&r));
        assert!(!ResultPredicate::equals("count", 4).evaluate(&r));
    }

    #[test]
    fn test_equals_matches_sequence_member() {
        let r = results(&[("colors", json!(["red", "blue"]))]);
        assert!(ResultPredicate::equals("colors", "blue").evaluate(&r));
        assert!(!ResultPredicate::equals("colors", "green").evaluate(&r));
        assert!(ResultPredicate::equals("colors", json!(["red", "blue"])).evaluate(&r));
    }

    #[test]
    fn test_missing_answer_is_false() {
        let r = results(&[("skipped", Value::Null)]);
        assert!(!ResultPredicate::exists("skipped").evaluate(&r));
        assert!(!ResultPredicate::exists("never").evaluate(&r));
        assert!(!ResultPredicate::is_true("never").evaluate(&r));
        assert!(ResultPredicate::negate(ResultPredicate::is_true("never")).evaluate(&r));
    }

    #[test]
    fn test_combinators() {
        let r = results(&[("skip", json!(true)), ("age", json!(70))]);
        let both = ResultPredicate::All(vec![
            ResultPredicate::is_true("skip"),
            ResultPredicate::equals("age", 70),
        ]);
        let either = ResultPredicate::Any(vec![
            ResultPredicate::equals("age", 10),
            ResultPredicate::exists("skip"),
        ]);
        assert!(both.evaluate(&r));
        assert!(either.evaluate(&r));
        assert!(ResultPredicate::All(vec![]).evaluate(&r));
        assert!(!ResultPredicate::Any(vec![]).evaluate(&r));
    }
}
