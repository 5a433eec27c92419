//! Input field definitions consumed by the table layer.
//!
//! These describe a question as authored: its data type, optionality,
//! choices and constraints. Rendering concerns are limited to an opaque
//! [`UiHint`].

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::answer::BaseType;
use crate::error::CoreError;
use crate::value::AnswerValue;

/// Leaf kind of an input field's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseKind {
    Boolean,
    String,
    Integer,
    Decimal,
    Fraction,
    Date,
    Year,
}

/// How a collection-typed field groups its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionKind {
    SingleChoice,
    MultipleChoice,
    MultipleComponent,
}

/// Human measurement kinds with locale-dependent units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementKind {
    Height,
    Weight,
    BloodPressure,
}

/// Declared data type of an input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    Base(BaseKind),
    Collection(CollectionKind, BaseKind),
    Measurement(MeasurementKind),
}

impl DataType {
    /// Base kind of the leaves, if any.
    pub fn base_kind(&self) -> Option<BaseKind> {
        match self {
            Self::Base(kind) | Self::Collection(_, kind) => Some(*kind),
            Self::Measurement(_) => None,
        }
    }

    /// Answer base type used when none is declared explicitly.
    pub fn default_answer_base_type(&self) -> BaseType {
        match self.base_kind() {
            Some(BaseKind::Boolean) => BaseType::Boolean,
            Some(BaseKind::String) => BaseType::String,
            Some(BaseKind::Integer) | Some(BaseKind::Year) => BaseType::Integer,
            Some(BaseKind::Decimal) | Some(BaseKind::Fraction) => BaseType::Decimal,
            Some(BaseKind::Date) => BaseType::Date,
            None => BaseType::Decimal,
        }
    }

    /// UI hints for which each choice is presented as its own row.
    pub fn list_selection_hints(&self) -> &'static [UiHint] {
        match self {
            Self::Collection(CollectionKind::SingleChoice, _)
            | Self::Collection(CollectionKind::MultipleChoice, _) => {
                &[UiHint::List, UiHint::Checkbox, UiHint::Radio]
            }
            Self::Base(BaseKind::Boolean) => &[UiHint::List, UiHint::Radio],
            _ => &[],
        }
    }

    /// Hint used when the field does not declare one.
    pub fn preferred_ui_hint(&self) -> UiHint {
        match self {
            Self::Collection(CollectionKind::MultipleComponent, _) => UiHint::Picker,
            Self::Collection(_, _) | Self::Base(BaseKind::Boolean) => UiHint::List,
            Self::Base(BaseKind::Date) | Self::Measurement(_) => UiHint::Picker,
            Self::Base(_) => UiHint::TextField,
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, Self::Collection(CollectionKind::MultipleChoice, _))
    }

    pub fn is_fraction(&self) -> bool {
        self.base_kind() == Some(BaseKind::Fraction)
    }
}

/// Presentation hint. Only list-selection detection depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UiHint {
    List,
    Checkbox,
    Radio,
    Toggle,
    Picker,
    Slider,
    TextField,
    Popover,
}

/// One selectable option of a choice question.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// Value recorded when selected. Valueless choices ("none of the above")
    /// never contribute to the answer.
    pub value: Option<AnswerValue>,

    /// Display text.
    pub text: Option<String>,

    /// Secondary display text.
    pub detail: Option<String>,

    /// Selecting this choice clears every other choice.
    pub is_exclusive: bool,
}

impl Choice {
    /// Create a non-exclusive choice with a value.
    pub fn new(value: impl Into<AnswerValue>) -> Self {
        Self {
            value: Some(value.into()),
            text: None,
            detail: None,
            is_exclusive: false,
        }
    }

    /// Create an exclusive choice without a value.
    pub fn none_of_the_above(text: impl Into<String>) -> Self {
        Self {
            value: None,
            text: Some(text.into()),
            detail: None,
            is_exclusive: true,
        }
    }

    /// Builder method to set the display text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder method to set the detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Builder method to mark the choice exclusive.
    pub fn exclusive(mut self) -> Self {
        self.is_exclusive = true;
        self
    }

    /// Whether this choice is part of the given answer.
    pub fn matches_answer(&self, answer: Option<&AnswerValue>) -> bool {
        match (&self.value, answer) {
            (Some(value), Some(answer)) => answer.contains(value),
            (None, None) => true,
            (None, Some(answer)) => answer.is_empty_sequence(),
            (Some(_), None) => false,
        }
    }
}

/// Numeric constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberRange {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub step_interval: Option<f64>,
    pub unit: Option<String>,
}

impl NumberRange {
    pub fn new(minimum: Option<f64>, maximum: Option<f64>) -> Self {
        Self {
            minimum,
            maximum,
            ..Default::default()
        }
    }

    /// Builder method to set the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Describe why `value` is out of range, if it is.
    pub fn violation(&self, value: f64) -> Option<String> {
        if let Some(min) = self.minimum {
            if value < min {
                return Some(format!("{value} is less than the minimum {min}"));
            }
        }
        if let Some(max) = self.maximum {
            if value > max {
                return Some(format!("{value} is greater than the maximum {max}"));
            }
        }
        None
    }
}

/// Date constraints and the pattern used to record the answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub minimum: Option<NaiveDateTime>,
    pub maximum: Option<NaiveDateTime>,

    /// strftime pattern for the recorded answer.
    pub result_format: Option<String>,
}

impl DateRange {
    pub fn violation(&self, value: NaiveDateTime) -> Option<String> {
        if let Some(min) = self.minimum {
            if value < min {
                return Some(format!("{value} is before {min}"));
            }
        }
        if let Some(max) = self.maximum {
            if value > max {
                return Some(format!("{value} is after {max}"));
            }
        }
        None
    }
}

/// Range attached to an input field.
#[derive(Debug, Clone, PartialEq)]
pub enum InputRange {
    Number(NumberRange),
    Date(DateRange),
}

/// Free-text constraints.
#[derive(Debug, Clone)]
pub struct TextValidation {
    pub pattern: Option<Regex>,
    pub invalid_message: Option<String>,
    pub max_length: Option<usize>,
}

impl TextValidation {
    /// Compile a validation pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self, CoreError> {
        let regex = Regex::new(pattern).map_err(|e| {
            CoreError::NavigationConfiguration(format!("invalid text pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            pattern: Some(regex),
            invalid_message: None,
            max_length: None,
        })
    }

    /// Only limit the length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            pattern: None,
            invalid_message: None,
            max_length: Some(max_length),
        }
    }

    /// Builder method to set the message reported on a pattern mismatch.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.invalid_message = Some(message.into());
        self
    }

    pub fn violation(&self, text: &str) -> Option<String> {
        if let Some(max) = self.max_length {
            if text.chars().count() > max {
                return Some(format!("text is longer than {max} characters"));
            }
        }
        match &self.pattern {
            Some(regex) if !regex.is_match(text) => Some(
                self.invalid_message
                    .clone()
                    .unwrap_or_else(|| format!("'{text}' does not match {}", regex.as_str())),
            ),
            _ => None,
        }
    }
}

/// A single question within a form step.
#[derive(Debug, Clone)]
pub struct InputField {
    pub identifier: String,
    pub prompt: Option<String>,
    pub data_type: DataType,
    pub ui_hint: Option<UiHint>,
    pub is_optional: bool,
    pub choices: Vec<Choice>,
    pub range: Option<InputRange>,
    pub text_validation: Option<TextValidation>,

    /// Separator between components of a multiple-component answer.
    pub separator: Option<String>,
}

impl InputField {
    /// Create a required input field.
    pub fn new(identifier: impl Into<String>, data_type: DataType) -> Self {
        Self {
            identifier: identifier.into(),
            prompt: None,
            data_type,
            ui_hint: None,
            is_optional: false,
            choices: Vec::new(),
            range: None,
            text_validation: None,
            separator: None,
        }
    }

    /// Builder method to set the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Builder method to mark the field optional.
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// Builder method to set the UI hint.
    pub fn with_ui_hint(mut self, hint: UiHint) -> Self {
        self.ui_hint = Some(hint);
        self
    }

    /// Builder method to set the choices.
    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    /// Builder method to set the range.
    pub fn with_range(mut self, range: InputRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Builder method to set text validation.
    pub fn with_text_validation(mut self, validation: TextValidation) -> Self {
        self.text_validation = Some(validation);
        self
    }

    /// Builder method to set the component separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Declared hint, or the data type's preferred one.
    pub fn effective_ui_hint(&self) -> UiHint {
        self.ui_hint.unwrap_or_else(|| self.data_type.preferred_ui_hint())
    }

    pub fn number_range(&self) -> Option<&NumberRange> {
        match &self.range {
            Some(InputRange::Number(range)) => Some(range),
            _ => None,
        }
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        match &self.range {
            Some(InputRange::Date(range)) => Some(range),
            _ => None,
        }
    }
}
