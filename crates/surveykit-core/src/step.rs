//! Step definitions.

use std::sync::Arc;

use crate::form::InputField;
use crate::ids::StepId;
use crate::navigator::ConditionalStepNavigator;
use crate::rule::{NavigationRule, ResultPredicate};

/// What a step does when displayed.
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Informational screen.
    Instruction,
    /// Questions, one item group per input field.
    Form { input_fields: Vec<InputField> },
    /// Sensor task with an optional fixed duration.
    Active { duration_secs: Option<f64> },
    /// Nested step collection with its own navigation.
    Section(Arc<ConditionalStepNavigator>),
    /// Final screen of a task.
    Completion,
}

/// Navigation declared on a step, evaluated when leaving or entering it.
#[derive(Debug, Clone, Default)]
pub struct StepNavigation {
    /// Checked in order when leaving the step; the first match wins.
    pub rules: Vec<NavigationRule>,

    /// Unconditional target used when no rule matches.
    pub next_step: Option<StepId>,

    /// When true on arrival, the step is passed over.
    pub skip_if: Option<ResultPredicate>,
}

/// One unit of a task's sequence.
#[derive(Debug, Clone)]
pub struct Step {
    pub identifier: StepId,
    pub title: Option<String>,
    pub kind: StepKind,
    pub navigation: StepNavigation,
}

impl Step {
    /// Create a step of the given kind.
    pub fn new(identifier: impl Into<StepId>, kind: StepKind) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
            kind,
            navigation: StepNavigation::default(),
        }
    }

    pub fn instruction(identifier: impl Into<StepId>) -> Self {
        Self::new(identifier, StepKind::Instruction)
    }

    pub fn form(identifier: impl Into<StepId>, input_fields: Vec<InputField>) -> Self {
        Self::new(identifier, StepKind::Form { input_fields })
    }

    pub fn active(identifier: impl Into<StepId>, duration_secs: Option<f64>) -> Self {
        Self::new(identifier, StepKind::Active { duration_secs })
    }

    pub fn section(identifier: impl Into<StepId>, navigator: ConditionalStepNavigator) -> Self {
        Self::new(identifier, StepKind::Section(Arc::new(navigator)))
    }

    pub fn completion(identifier: impl Into<StepId>) -> Self {
        Self::new(identifier, StepKind::Completion)
    }

    /// Builder method to set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder method to add a conditional skip rule.
    pub fn with_rule(mut self, rule: NavigationRule) -> Self {
        self.navigation.rules.push(rule);
        self
    }

    /// Builder method to set the unconditional next step.
    pub fn with_next_step(mut self, identifier: impl Into<StepId>) -> Self {
        self.navigation.next_step = Some(identifier.into());
        self
    }

    /// Builder method to set the skip condition.
    pub fn with_skip_if(mut self, predicate: ResultPredicate) -> Self {
        self.navigation.skip_if = Some(predicate);
        self
    }

    /// Input fields of a form step; empty otherwise.
    pub fn input_fields(&self) -> &[InputField] {
        match &self.kind {
            StepKind::Form { input_fields } => input_fields,
            _ => &[],
        }
    }

    pub fn as_section(&self) -> Option<&Arc<ConditionalStepNavigator>> {
        match &self.kind {
            StepKind::Section(navigator) => Some(navigator),
            _ => None,
        }
    }

    /// Whether navigation from or to this step can deviate from declared order.
    pub fn is_conditional(&self) -> bool {
        !self.navigation.rules.is_empty()
            || self.navigation.next_step.is_some()
            || self.navigation.skip_if.is_some()
    }
}
