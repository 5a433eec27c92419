//! Newtype wrappers for identifiers to ensure type safety.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Reserved skip target that finishes the current step collection.
pub const EXIT_IDENTIFIER: &str = "exit";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the inner string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a step, unique within one step collection level.
    StepId
);

string_id!(
    /// Unique identifier for a single execution of a task.
    RunId
);

string_id!(
    /// Stable identity token for a table item group.
    GroupId
);

impl StepId {
    /// Returns true if this is the reserved exit target.
    pub fn is_exit(&self) -> bool {
        self.0 == EXIT_IDENTIFIER
    }
}

impl RunId {
    /// Generate a new random RunId.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl GroupId {
    /// Generate a new random GroupId.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_run_id_generate() {
        let id1 = RunId::generate();
        let id2 = RunId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_display() {
        let id = StepId::new("question-1");
        assert_eq!(format!("{}", id), "question-1");
    }

    #[test]
    fn test_step_id_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(StepId::new("intro"), 0usize);
        assert_eq!(map.get("intro"), Some(&0));
    }

    #[test]
    fn test_exit_target() {
        assert!(StepId::new(EXIT_IDENTIFIER).is_exit());
        assert!(!StepId::new("step1").is_exit());
    }
}
