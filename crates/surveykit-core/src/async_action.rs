//! Background actions bound to step entry and exit.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::StepId;
use crate::navigator::{ConditionalStepNavigator, StepNavigator};
use crate::permission::PermissionType;

/// Declaration of a background data-collection action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncActionConfiguration {
    pub identifier: String,

    /// Step whose arrival starts the action. `None` starts it with the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_step_identifier: Option<StepId>,

    /// Step whose departure stops the action. `None` runs until the task ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_step_identifier: Option<StepId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<PermissionType>,
}

impl AsyncActionConfiguration {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            start_step_identifier: None,
            stop_step_identifier: None,
            permission: None,
        }
    }

    /// Builder method to set the start trigger.
    pub fn starting_at(mut self, step: impl Into<StepId>) -> Self {
        self.start_step_identifier = Some(step.into());
        self
    }

    /// Builder method to set the stop trigger.
    pub fn stopping_after(mut self, step: impl Into<StepId>) -> Self {
        self.stop_step_identifier = Some(step.into());
        self
    }

    /// Builder method to set the permission the action needs.
    pub fn with_permission(mut self, permission: PermissionType) -> Self {
        self.permission = Some(permission);
        self
    }
}

/// Computes which actions start and stop at a step. Purely declarative:
/// starting and stopping them is up to the caller.
#[derive(Debug, Clone, Default)]
pub struct AsyncActionCoordinator {
    actions: Vec<AsyncActionConfiguration>,
}

impl AsyncActionCoordinator {
    pub fn new(actions: Vec<AsyncActionConfiguration>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[AsyncActionConfiguration] {
        &self.actions
    }

    /// Actions triggered by arriving at `step`, in declaration order.
    pub fn actions_to_start(&self, step: &StepId, is_first_step: bool) -> Vec<&AsyncActionConfiguration> {
        self.actions
            .iter()
            .filter(|action| match &action.start_step_identifier {
                Some(start) => start == step,
                None => is_first_step,
            })
            .collect()
    }

    /// Actions triggered by leaving `step`.
    pub fn actions_to_stop(&self, step: &StepId) -> Vec<&AsyncActionConfiguration> {
        self.actions
            .iter()
            .filter(|action| action.stop_step_identifier.as_ref() == Some(step))
            .collect()
    }

    /// Check that identifiers are unique and every trigger names a step.
    pub fn validate(&self, navigator: &ConditionalStepNavigator) -> Result<(), CoreError> {
        for (position, action) in self.actions.iter().enumerate() {
            if self.actions[..position]
                .iter()
                .any(|other| other.identifier == action.identifier)
            {
                return Err(CoreError::NavigationConfiguration(format!(
                    "duplicate async action '{}'",
                    action.identifier
                )));
            }

            let triggers = action
                .start_step_identifier
                .iter()
                .chain(action.stop_step_identifier.iter());
            for trigger in triggers {
                if navigator.step(trigger.as_str()).is_none() {
                    return Err(CoreError::NavigationConfiguration(format!(
                        "async action '{}' is triggered by unknown step '{}'",
                        action.identifier, trigger
                    )));
                }
            }
        }
        Ok(())
    }
}
