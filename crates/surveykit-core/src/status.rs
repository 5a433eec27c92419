//! Run status.

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`crate::TaskRun`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Created but `start` not yet called.
    #[default]
    NotStarted,
    /// Showing a step.
    Running,
    /// Navigation reached the end of the task.
    Completed,
    /// Cancelled by the participant or the host.
    Cancelled,
}

impl RunStatus {
    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns true if the run is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::NotStarted.is_terminal());
        assert!(RunStatus::Running.is_active());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert_eq!(RunStatus::default(), RunStatus::NotStarted);
        assert_eq!(serde_json::to_string(&RunStatus::NotStarted).unwrap(), "\"NOT_STARTED\"");
    }
}
