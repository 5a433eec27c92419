//! Core domain errors.

use thiserror::Error;

/// Core domain errors for SurveyKit.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON shape does not match the declared answer type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Value fails a field-specific constraint (range, pattern, required).
    #[error("Invalid answer for '{identifier}': {reason}")]
    InvalidAnswer { identifier: String, reason: String },

    /// A prior result was recorded with a different answer type.
    #[error("Invalid answer type for '{identifier}': expected {expected}, found {found}")]
    InvalidType {
        identifier: String,
        expected: String,
        found: String,
    },

    /// Operation is not supported by this group or row.
    #[error("'{operation}' is not supported by '{identifier}'")]
    UnsupportedOperation {
        identifier: String,
        operation: &'static str,
    },

    /// Task definition is malformed.
    #[error("Navigation configuration error: {0}")]
    NavigationConfiguration(String),

    /// Sensor permission could not be obtained.
    #[error("Permission error: {0}")]
    Permission(String),
}

impl CoreError {
    /// Build a `TypeMismatch` for a JSON value that did not fit `expected`.
    pub(crate) fn mismatch(expected: impl ToString, found: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: json_kind(found).to_string(),
        }
    }

    /// Returns true for errors a UI adapter can recover from by re-prompting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::InvalidAnswer { .. } | Self::InvalidType { .. }
        )
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
