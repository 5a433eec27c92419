//! SurveyKit Core
//!
//! Step navigation and typed-answer serialization for survey and active
//! tasks. This crate has no dependencies on:
//! - UI toolkits
//! - Platform sensor or permission APIs
//! - Storage
//!
//! A [`Task`] is a validated graph of [`Step`]s. A [`TaskRun`] walks it,
//! exposing one [`InputFieldTableItemGroup`] per question and recording
//! answers as JSON in a [`TaskResult`].

pub mod answer;
pub mod async_action;
pub mod config;
pub mod error;
pub mod form;
pub mod ids;
pub mod navigator;
pub mod permission;
pub mod result;
pub mod rule;
pub mod status;
pub mod step;
pub mod table;
pub mod task;
pub mod task_run;
pub mod value;

// Re-export commonly used types
pub use answer::{AnswerType, BaseType, SequenceType};
pub use async_action::{AsyncActionConfiguration, AsyncActionCoordinator};
pub use config::RunConfig;
pub use error::CoreError;
pub use form::{
    BaseKind, Choice, CollectionKind, DataType, DateRange, InputField, InputRange, MeasurementKind,
    NumberRange, TextValidation, UiHint,
};
pub use ids::{GroupId, RunId, StepId, EXIT_IDENTIFIER};
pub use navigator::{ConditionalStepNavigator, NavigationError, Progress, StepNavigator, Transition};
pub use permission::{
    AuthorizationStatus, CachedAuthorization, InMemoryPermissionCache, PermissionCache,
    PermissionRequester, PermissionType,
};
pub use result::{AnswerResult, CollectionResult, ResultLookup, ResultRecord, StepResult, TaskResult};
pub use rule::{NavigationRule, ResultPredicate};
pub use status::RunStatus;
pub use step::{Step, StepKind};
pub use table::{InputFieldTableItemGroup, ItemGroup, TableItem, TableItemKind};
pub use task::Task;
pub use task_run::{StepChange, TaskRun};
pub use value::{AnswerValue, Fraction};
