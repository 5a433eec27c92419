//! Run configuration.

/// Options controlling how a [`crate::TaskRun`] moves between steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Refuse `go_forward` while any item group on the step is invalid.
    pub require_valid_answers: bool,

    /// Reset a group whose prior answer has a different answer type instead
    /// of failing the transition.
    pub discard_mismatched_answers: bool,

    /// Allow `go_back`. Combined with the navigator's own setting.
    pub allow_backward: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            require_valid_answers: true,
            discard_mismatched_answers: true,
            allow_backward: true,
        }
    }
}

impl RunConfig {
    /// Builder method for one-way runs.
    pub fn one_way(mut self) -> Self {
        self.allow_backward = false;
        self
    }
}
