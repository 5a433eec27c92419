//! Task definition.

use std::collections::HashMap;
use std::sync::Arc;

use crate::async_action::AsyncActionCoordinator;
use crate::error::CoreError;
use crate::navigator::ConditionalStepNavigator;

/// A validated task: steps, their navigation and the async actions bound to
/// them.
#[derive(Debug, Clone)]
pub struct Task {
    /// Task identifier, used as the result set identifier.
    pub identifier: String,

    pub navigator: Arc<ConditionalStepNavigator>,

    pub coordinator: AsyncActionCoordinator,

    /// Free-form schema metadata (name, revision) carried into results.
    pub schema_info: HashMap<String, String>,
}

impl Task {
    /// Create a task, validating the async action triggers against the steps.
    pub fn new(
        identifier: impl Into<String>,
        navigator: ConditionalStepNavigator,
        coordinator: AsyncActionCoordinator,
    ) -> Result<Self, CoreError> {
        coordinator.validate(&navigator)?;
        Ok(Self {
            identifier: identifier.into(),
            navigator: Arc::new(navigator),
            coordinator,
            schema_info: HashMap::new(),
        })
    }

    /// Builder method to add schema metadata.
    pub fn with_schema_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.schema_info.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_action::AsyncActionConfiguration;
    use crate::step::Step;

    #[test]
    fn test_task_validates_actions() {
        let nav = ConditionalStepNavigator::new(vec![Step::instruction("intro")]).unwrap();
        let bad = AsyncActionCoordinator::new(vec![AsyncActionConfiguration::new("gps").stopping_after("walk")]);
        assert!(Task::new("survey", nav.clone(), bad).is_err());

        let task = Task::new("survey", nav, AsyncActionCoordinator::default())
            .unwrap()
            .with_schema_info("revision", "3");
        assert_eq!(task.identifier, "survey");
        assert_eq!(task.schema_info.get("revision").map(String::as_str), Some("3"));
    }
}
