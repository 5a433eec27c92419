//! Step sequencing.
//!
//! A navigator decides which step follows or precedes another given the
//! results recorded so far. It holds no run state of its own: everything
//! it needs is the current step identifier and a [`ResultLookup`].

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::ids::{StepId, EXIT_IDENTIFIER};
use crate::result::ResultLookup;
use crate::step::Step;

/// Position within a task for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based position of the step.
    pub current: usize,
    pub total: usize,
    /// True when branching can change the realized path length.
    pub is_estimated: bool,
}

/// Problems found during live navigation. These end the collection rather
/// than failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Step '{from}' skips to unknown step '{target}'")]
    UnresolvedTarget { from: StepId, target: StepId },

    #[error("Unknown current step '{0}'")]
    UnknownStep(StepId),
}

/// Outcome of asking for the next step. `step == None` means the collection
/// is complete.
#[derive(Debug, Clone)]
pub struct Transition<'a> {
    pub step: Option<&'a Step>,
    pub error: Option<NavigationError>,
}

impl<'a> Transition<'a> {
    fn to(step: Option<&'a Step>) -> Self {
        Self { step, error: None }
    }

    fn failed(error: NavigationError) -> Self {
        Self {
            step: None,
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.step.is_none()
    }
}

/// Step sequencing contract.
pub trait StepNavigator {
    /// Look up a step by identifier.
    fn step(&self, identifier: &str) -> Option<&Step>;

    /// The step after `current`, or the first step when `current` is `None`.
    fn step_after(&self, current: Option<&StepId>, results: &dyn ResultLookup) -> Transition<'_>;

    /// The step to return to from `current`, if backward navigation is possible.
    fn step_before(&self, current: &StepId, results: &dyn ResultLookup) -> Option<&Step>;

    /// Progress for `current`, or `None` when it has no defined position.
    fn progress(&self, current: &StepId, results: &dyn ResultLookup) -> Option<Progress>;

    /// The first step that is not skipped.
    fn first_step(&self, results: &dyn ResultLookup) -> Option<&Step> {
        self.step_after(None, results).step
    }

    fn has_step_after(&self, current: Option<&StepId>, results: &dyn ResultLookup) -> bool {
        self.step_after(current, results).step.is_some()
    }

    fn has_step_before(&self, current: &StepId, results: &dyn ResultLookup) -> bool {
        self.step_before(current, results).is_some()
    }
}

/// Navigator over an ordered step list with per-step conditional rules.
#[derive(Debug, Clone)]
pub struct ConditionalStepNavigator {
    steps: Vec<Step>,
    index: HashMap<StepId, usize>,
    progress_markers: Option<Vec<StepId>>,
    allows_backward: bool,
}

impl ConditionalStepNavigator {
    /// Build and validate a navigator.
    ///
    /// Fails when an identifier repeats at this level, uses the reserved
    /// exit identifier, or a rule targets a step that does not exist. A
    /// section must hold at least one step and may not target itself.
    pub fn new(steps: Vec<Step>) -> Result<Self, CoreError> {
        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if step.identifier.is_exit() {
                return Err(CoreError::NavigationConfiguration(format!(
                    "'{EXIT_IDENTIFIER}' is reserved and cannot name a step"
                )));
            }
            if index.insert(step.identifier.clone(), position).is_some() {
                return Err(CoreError::NavigationConfiguration(format!(
                    "duplicate step identifier '{}'",
                    step.identifier
                )));
            }
            validate_input_fields(step)?;
            if step.as_section().is_some_and(|section| section.steps.is_empty()) {
                return Err(CoreError::NavigationConfiguration(format!(
                    "section '{}' has no steps",
                    step.identifier
                )));
            }
        }

        for step in &steps {
            let targets = step
                .navigation
                .rules
                .iter()
                .map(|rule| &rule.skip_to)
                .chain(step.navigation.next_step.iter());
            for target in targets {
                if step.as_section().is_some() && *target == step.identifier {
                    return Err(CoreError::NavigationConfiguration(format!(
                        "section '{}' targets itself",
                        step.identifier
                    )));
                }
                if !target.is_exit() && !index.contains_key(target) {
                    return Err(CoreError::NavigationConfiguration(format!(
                        "step '{}' skips to unknown step '{}'",
                        step.identifier, target
                    )));
                }
            }
        }

        Ok(Self {
            steps,
            index,
            progress_markers: None,
            allows_backward: true,
        })
    }

    /// Builder method to report progress against explicit marker steps.
    pub fn with_progress_markers(mut self, markers: Vec<StepId>) -> Result<Self, CoreError> {
        if let Some(missing) = markers.iter().find(|m| !self.index.contains_key(*m)) {
            return Err(CoreError::NavigationConfiguration(format!(
                "progress marker '{missing}' is not a step"
            )));
        }
        self.progress_markers = Some(markers);
        Ok(self)
    }

    /// Builder method to make the collection one-way.
    pub fn one_way(mut self) -> Self {
        self.allows_backward = false;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn allows_backward(&self) -> bool {
        self.allows_backward
    }

    /// True when no step declares rules, targets or skip conditions.
    pub fn is_linear(&self) -> bool {
        !self.steps.iter().any(Step::is_conditional)
    }

    fn position(&self, identifier: &str) -> Option<usize> {
        self.index.get(identifier).copied()
    }

    /// First position at or after `start` whose skip condition does not hold.
    fn first_unskipped(&self, start: usize, results: &dyn ResultLookup) -> Option<usize> {
        (start..self.steps.len()).find(|&position| {
            let step = &self.steps[position];
            let skip = step
                .navigation
                .skip_if
                .as_ref()
                .map(|p| p.evaluate(results))
                .unwrap_or(false);
            if skip {
                debug!(step = %step.identifier, "Skipping step");
            }
            !skip
        })
    }
}

impl StepNavigator for ConditionalStepNavigator {
    fn step(&self, identifier: &str) -> Option<&Step> {
        self.position(identifier).map(|position| &self.steps[position])
    }

    fn step_after(&self, current: Option<&StepId>, results: &dyn ResultLookup) -> Transition<'_> {
        let start = match current {
            None => 0,
            Some(current_id) => {
                let Some(position) = self.position(current_id.as_str()) else {
                    warn!(step = %current_id, "Navigation from unknown step");
                    return Transition::failed(NavigationError::UnknownStep(current_id.clone()));
                };
                let step = &self.steps[position];
                let target = step
                    .navigation
                    .rules
                    .iter()
                    .find(|rule| rule.predicate.evaluate(results))
                    .map(|rule| &rule.skip_to)
                    .or(step.navigation.next_step.as_ref());

                match target {
                    Some(target) if target.is_exit() => return Transition::to(None),
                    Some(target) => match self.position(target.as_str()) {
                        Some(target_position) => {
                            debug!(from = %current_id, to = %target, "Following navigation rule");
                            target_position
                        }
                        None => {
                            warn!(from = %current_id, target = %target, "Skip target not found, ending collection");
                            return Transition::failed(NavigationError::UnresolvedTarget {
                                from: current_id.clone(),
                                target: target.clone(),
                            });
                        }
                    },
                    None => position + 1,
                }
            }
        };

        Transition::to(self.first_unskipped(start, results).map(|p| &self.steps[p]))
    }

    fn step_before(&self, current: &StepId, results: &dyn ResultLookup) -> Option<&Step> {
        if !self.allows_backward {
            return None;
        }
        let position = self.position(current.as_str())?;

        // Walk back along the realized path when there is one.
        let history: Vec<&str> = results
            .history_identifiers()
            .into_iter()
            .filter(|id| self.index.contains_key(*id))
            .collect();
        if !history.is_empty() {
            let end = history
                .iter()
                .position(|id| *id == current.as_str())
                .unwrap_or(history.len());
            return history[..end]
                .iter()
                .rev()
                .find(|id| **id != current.as_str())
                .and_then(|id| self.step(id));
        }

        (0..position).rev().map(|p| &self.steps[p]).find(|step| {
            !step
                .navigation
                .skip_if
                .as_ref()
                .map(|p| p.evaluate(results))
                .unwrap_or(false)
        })
    }

    fn progress(&self, current: &StepId, _results: &dyn ResultLookup) -> Option<Progress> {
        let position = self.position(current.as_str())?;

        if let Some(markers) = &self.progress_markers {
            let reached = markers
                .iter()
                .filter_map(|m| self.position(m.as_str()))
                .filter(|&marker| marker <= position)
                .count();
            if reached == 0 {
                return None;
            }
            return Some(Progress {
                current: reached,
                total: markers.len(),
                is_estimated: false,
            });
        }

        Some(Progress {
            current: position + 1,
            total: self.steps.len(),
            is_estimated: !self.is_linear(),
        })
    }
}

fn validate_input_fields(step: &Step) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for field in step.input_fields() {
        if !seen.insert(field.identifier.as_str()) {
            return Err(CoreError::NavigationConfiguration(format!(
                "duplicate input field '{}' in step '{}'",
                field.identifier, step.identifier
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerType, BaseType};
    use crate::result::{AnswerResult, ResultRecord, StepResult, TaskResult};
    use crate::rule::{NavigationRule, ResultPredicate};
    use chrono::Utc;
    use serde_json::json;

    fn linear(count: usize) -> ConditionalStepNavigator {
        let steps = (1..=count).map(|i| Step::instruction(format!("step{i}"))).collect();
        ConditionalStepNavigator::new(steps).unwrap()
    }

    fn branching() -> ConditionalStepNavigator {
        ConditionalStepNavigator::new(vec![
            Step::instruction("S1"),
            Step::form("S2", vec![]).with_rule(NavigationRule::new(
                ResultPredicate::equals("skip", true),
                "S4",
            )),
            Step::instruction("S3"),
            Step::instruction("S4"),
        ])
        .unwrap()
    }

    fn with_answer(id: &str, value: serde_json::Value) -> TaskResult {
        let mut result = TaskResult::new("task");
        result.append(ResultRecord::Answer(AnswerResult::new(
            id,
            AnswerType::new(BaseType::Boolean),
            value,
        )));
        result
    }

    fn visited(ids: &[&str]) -> TaskResult {
        let mut result = TaskResult::new("task");
        for id in ids {
            result.append(ResultRecord::Step(StepResult::new(StepId::new(*id), Utc::now())));
        }
        result
    }

    fn id(s: &str) -> StepId {
        StepId::new(s)
    }

    #[test]
    fn test_linear_walk() {
        let nav = linear(3);
        let empty = TaskResult::new("task");

        let first = nav.first_step(&empty).unwrap();
        assert_eq!(first.identifier.as_str(), "step1");
        let second = nav.step_after(Some(&first.identifier), &empty).step.unwrap();
        assert_eq!(second.identifier.as_str(), "step2");

        let end = nav.step_after(Some(&id("step3")), &empty);
        assert!(end.is_complete());
        assert!(end.error.is_none());
        assert!(!nav.has_step_after(Some(&id("step3")), &empty));
    }

    #[test]
    fn test_linear_progress() {
        let nav = linear(5);
        let empty = TaskResult::new("task");
        assert_eq!(
            nav.progress(&id("step3"), &empty),
            Some(Progress {
                current: 3,
                total: 5,
                is_estimated: false
            })
        );
    }

    #[test]
    fn test_branching_progress_is_estimated() {
        let nav = branching();
        let empty = TaskResult::new("task");
        for step in ["S1", "S2", "S3", "S4"] {
            assert!(nav.progress(&id(step), &empty).unwrap().is_estimated);
        }
    }

    #[test]
    fn test_conditional_skip() {
        let nav = branching();

        let skip = with_answer("skip", json!(true));
        assert_eq!(
            nav.step_after(Some(&id("S2")), &skip).step.unwrap().identifier.as_str(),
            "S4"
        );

        let no_skip = with_answer("skip", json!(false));
        assert_eq!(
            nav.step_after(Some(&id("S2")), &no_skip).step.unwrap().identifier.as_str(),
            "S3"
        );

        let empty = TaskResult::new("task");
        assert_eq!(
            nav.step_after(Some(&id("S2")), &empty).step.unwrap().identifier.as_str(),
            "S3"
        );
    }

    #[test]
    fn test_exit_target_completes() {
        let nav = ConditionalStepNavigator::new(vec![
            Step::instruction("a").with_next_step(EXIT_IDENTIFIER),
            Step::instruction("b"),
        ])
        .unwrap();
        let empty = TaskResult::new("task");
        let transition = nav.step_after(Some(&id("a")), &empty);
        assert!(transition.is_complete());
        assert!(transition.error.is_none());
    }

    #[test]
    fn test_skip_if_passes_over_step() {
        let nav = ConditionalStepNavigator::new(vec![
            Step::instruction("a"),
            Step::instruction("b").with_skip_if(ResultPredicate::is_true("consented")),
            Step::instruction("c"),
        ])
        .unwrap();
        let consented = with_answer("consented", json!(true));
        assert_eq!(
            nav.step_after(Some(&id("a")), &consented).step.unwrap().identifier.as_str(),
            "c"
        );
        assert_eq!(
            nav.step_before(&id("c"), &consented).unwrap().identifier.as_str(),
            "a"
        );
    }

    #[test]
    fn test_unknown_current_step() {
        let nav = linear(2);
        let empty = TaskResult::new("task");
        let transition = nav.step_after(Some(&id("missing")), &empty);
        assert!(transition.is_complete());
        assert_eq!(transition.error, Some(NavigationError::UnknownStep(id("missing"))));
    }

    #[test]
    fn test_step_before_follows_history() {
        let nav = branching();
        let history = visited(&["S1", "S2"]);

        // S4 was reached by skipping S3, so back leads to S2.
        assert_eq!(nav.step_before(&id("S4"), &history).unwrap().identifier.as_str(), "S2");
        assert_eq!(nav.step_before(&id("S2"), &history).unwrap().identifier.as_str(), "S1");
        assert!(nav.step_before(&id("S1"), &history).is_none());
    }

    #[test]
    fn test_step_before_without_history_is_structural() {
        let nav = linear(3);
        let empty = TaskResult::new("task");
        assert_eq!(nav.step_before(&id("step3"), &empty).unwrap().identifier.as_str(), "step2");
        assert!(!nav.has_step_before(&id("step1"), &empty));
    }

    #[test]
    fn test_one_way_disallows_back() {
        let nav = linear(3).one_way();
        let empty = TaskResult::new("task");
        assert!(nav.step_before(&id("step2"), &empty).is_none());
    }

    #[test]
    fn test_progress_markers() {
        let nav = branching()
            .with_progress_markers(vec![id("S2"), id("S4")])
            .unwrap();
        let empty = TaskResult::new("task");
        assert_eq!(nav.progress(&id("S1"), &empty), None);
        assert_eq!(
            nav.progress(&id("S3"), &empty),
            Some(Progress {
                current: 1,
                total: 2,
                is_estimated: false
            })
        );
        assert!(branching().with_progress_markers(vec![id("nope")]).is_err());
    }

    #[test]
    fn test_validation_errors() {
        let duplicate =
            ConditionalStepNavigator::new(vec![Step::instruction("a"), Step::instruction("a")]);
        assert!(matches!(duplicate, Err(CoreError::NavigationConfiguration(_))));

        let unresolved = ConditionalStepNavigator::new(vec![
            Step::instruction("a").with_rule(NavigationRule::new(ResultPredicate::exists("x"), "zzz")),
        ]);
        assert!(matches!(unresolved, Err(CoreError::NavigationConfiguration(_))));

        let reserved = ConditionalStepNavigator::new(vec![Step::instruction(EXIT_IDENTIFIER)]);
        assert!(reserved.is_err());
    }

    #[test]
    fn test_section_shape_errors() {
        let empty = ConditionalStepNavigator::new(vec![]).unwrap();
        let nav = ConditionalStepNavigator::new(vec![Step::section("part", empty)]);
        assert!(matches!(nav, Err(CoreError::NavigationConfiguration(_))));

        let inner = ConditionalStepNavigator::new(vec![Step::instruction("q")]).unwrap();
        let looping = ConditionalStepNavigator::new(vec![
            Step::section("part", inner.clone()).with_next_step("part"),
        ]);
        assert!(matches!(looping, Err(CoreError::NavigationConfiguration(_))));

        let by_rule = ConditionalStepNavigator::new(vec![Step::section("part", inner)
            .with_rule(NavigationRule::new(ResultPredicate::exists("x"), "part"))]);
        assert!(by_rule.is_err());

        // A plain step may repeat itself; the participant still sees it.
        let repeat = ConditionalStepNavigator::new(vec![Step::instruction("a").with_next_step("a")]);
        assert!(repeat.is_ok());
    }

    #[test]
    fn test_sections_may_reuse_identifiers() {
        let inner_a = ConditionalStepNavigator::new(vec![Step::instruction("intro")]).unwrap();
        let inner_b = ConditionalStepNavigator::new(vec![Step::instruction("intro")]).unwrap();
        let nav = ConditionalStepNavigator::new(vec![
            Step::section("part1", inner_a),
            Step::section("part2", inner_b),
        ]);
        assert!(nav.is_ok());
    }
}
