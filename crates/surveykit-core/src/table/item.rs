//! Table items (rows) backing an input field.

use std::sync::Arc;

use serde_json::Value;

use crate::answer::AnswerType;
use crate::error::CoreError;
use crate::form::{Choice, InputField, UiHint};
use crate::value::AnswerValue;

/// A single row of an item group.
#[derive(Debug, Clone)]
pub struct TableItem {
    /// Absolute row index within the step's table.
    pub row_index: usize,

    pub kind: TableItemKind,
}

/// Row variants. Only choice rows support selection.
#[derive(Debug, Clone)]
pub enum TableItemKind {
    /// Free entry (text, number, date, picker) that validates its own answer.
    Text(TextInputItem),
    /// One selectable choice.
    Choice(ChoiceItem),
    /// Static content with no answer.
    Label(String),
}

impl TableItem {
    pub fn text(row_index: usize, item: TextInputItem) -> Self {
        Self {
            row_index,
            kind: TableItemKind::Text(item),
        }
    }

    pub fn choice(row_index: usize, item: ChoiceItem) -> Self {
        Self {
            row_index,
            kind: TableItemKind::Choice(item),
        }
    }

    pub fn label(row_index: usize, text: impl Into<String>) -> Self {
        Self {
            row_index,
            kind: TableItemKind::Label(text.into()),
        }
    }

    /// Capability flag checked by `select`.
    pub fn supports_selection(&self) -> bool {
        matches!(self.kind, TableItemKind::Choice(_))
    }

    /// Optionality of the row's own input field. Rows without one are optional.
    pub fn is_optional(&self) -> bool {
        match &self.kind {
            TableItemKind::Text(item) => item.input_field.is_optional,
            TableItemKind::Choice(item) => item.input_field.is_optional,
            TableItemKind::Label(_) => true,
        }
    }

    pub fn as_text(&self) -> Option<&TextInputItem> {
        match &self.kind {
            TableItemKind::Text(item) => Some(item),
            _ => None,
        }
    }

    pub(crate) fn as_text_mut(&mut self) -> Option<&mut TextInputItem> {
        match &mut self.kind {
            TableItemKind::Text(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&ChoiceItem> {
        match &self.kind {
            TableItemKind::Choice(item) => Some(item),
            _ => None,
        }
    }

    pub(crate) fn as_choice_mut(&mut self) -> Option<&mut ChoiceItem> {
        match &mut self.kind {
            TableItemKind::Choice(item) => Some(item),
            _ => None,
        }
    }
}

/// A row that accepts a typed or textual answer and enforces the field's
/// constraints.
#[derive(Debug, Clone)]
pub struct TextInputItem {
    pub input_field: Arc<InputField>,
    pub ui_hint: UiHint,
    pub answer_type: Arc<AnswerType>,

    /// Echo of the owning group's answer.
    answer: Option<AnswerValue>,
}

impl TextInputItem {
    pub fn new(input_field: Arc<InputField>, ui_hint: UiHint, answer_type: Arc<AnswerType>) -> Self {
        Self {
            input_field,
            ui_hint,
            answer_type,
            answer: None,
        }
    }

    pub fn answer(&self) -> Option<&AnswerValue> {
        self.answer.as_ref()
    }

    pub(crate) fn set_cached_answer(&mut self, answer: Option<AnswerValue>) {
        self.answer = answer;
    }

    /// Coerce `value` to the answer type and check the field's constraints.
    ///
    /// Strings are parsed into the declared kind (so `"12.5"` becomes a
    /// decimal); any other value must already have the declared shape.
    pub fn validate(&self, value: Option<AnswerValue>) -> Result<Option<AnswerValue>, CoreError> {
        let Some(value) = value else {
            return Ok(None);
        };

        let coerced = match value {
            AnswerValue::String(text) if !self.accepts_raw_text() => self
                .answer_type
                .decode(&Value::String(text))
                .map_err(|e| self.invalid(e.to_string()))?
                .ok_or_else(|| self.invalid("empty answer".to_string()))?,
            other => {
                self.answer_type
                    .encode(&other)
                    .map_err(|e| self.invalid(e.to_string()))?;
                other
            }
        };

        self.check_constraints(&coerced)?;
        Ok(Some(coerced))
    }

    fn accepts_raw_text(&self) -> bool {
        self.answer_type.base_type == crate::answer::BaseType::String
            && !self.answer_type.is_sequence()
    }

    fn check_constraints(&self, value: &AnswerValue) -> Result<(), CoreError> {
        if let AnswerValue::Sequence(items) = value {
            return items.iter().try_for_each(|item| self.check_constraints(item));
        }

        let violation = match value {
            AnswerValue::String(text) => self
                .input_field
                .text_validation
                .as_ref()
                .and_then(|v| v.violation(text)),
            AnswerValue::Date(date) => self
                .input_field
                .date_range()
                .and_then(|range| range.violation(*date)),
            numeric => match (self.input_field.number_range(), numeric.as_f64()) {
                (Some(range), Some(number)) => range.violation(number),
                _ => None,
            },
        };

        match violation {
            Some(reason) => Err(self.invalid(reason)),
            None => Ok(()),
        }
    }

    fn invalid(&self, reason: String) -> CoreError {
        CoreError::InvalidAnswer {
            identifier: self.input_field.identifier.clone(),
            reason,
        }
    }
}

/// A row representing one choice.
#[derive(Debug, Clone)]
pub struct ChoiceItem {
    pub input_field: Arc<InputField>,
    pub ui_hint: UiHint,
    pub choice: Choice,
    pub selected: bool,
}

impl ChoiceItem {
    pub fn new(input_field: Arc<InputField>, ui_hint: UiHint, choice: Choice) -> Self {
        Self {
            input_field,
            ui_hint,
            choice,
            selected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::BaseType;
    use crate::form::{BaseKind, DataType, InputRange, NumberRange, TextValidation};

    fn number_item(min: f64, max: f64) -> TextInputItem {
        let field = InputField::new("age", DataType::Base(BaseKind::Integer))
            .with_range(InputRange::Number(NumberRange::new(Some(min), Some(max))));
        TextInputItem::new(
            Arc::new(field),
            UiHint::TextField,
            Arc::new(AnswerType::new(BaseType::Integer)),
        )
    }

    #[test]
    fn test_text_is_coerced_to_number() {
        let item = number_item(0.0, 120.0);
        let value = item.validate(Some("42".into())).unwrap();
        assert_eq!(value, Some(AnswerValue::Integer(42)));
    }

    #[test]
    fn test_number_out_of_range() {
        let item = number_item(0.0, 120.0);
        let err = item.validate(Some(AnswerValue::Integer(200))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAnswer { ref identifier, .. } if identifier == "age"));
    }

    #[test]
    fn test_uncoercible_text_is_invalid() {
        let item = number_item(0.0, 120.0);
        assert!(matches!(
            item.validate(Some("forty".into())),
            Err(CoreError::InvalidAnswer { .. })
        ));
        assert!(item.validate(Some(AnswerValue::Boolean(true))).is_err());
    }

    #[test]
    fn test_absent_answer_passes() {
        let item = number_item(0.0, 1.0);
        assert_eq!(item.validate(None).unwrap(), None);
    }

    #[test]
    fn test_text_pattern() {
        let field = InputField::new("zip", DataType::Base(BaseKind::String))
            .with_text_validation(TextValidation::with_pattern(r"^\d{5}$").unwrap());
        let item = TextInputItem::new(
            Arc::new(field),
            UiHint::TextField,
            Arc::new(AnswerType::new(BaseType::String)),
        );
        assert!(item.validate(Some("02139".into())).is_ok());
        assert!(item.validate(Some("2139".into())).is_err());
    }

    #[test]
    fn test_selection_capability() {
        let field = Arc::new(InputField::new("q", DataType::Base(BaseKind::String)));
        let choice = TableItem::choice(0, ChoiceItem::new(field, UiHint::List, Choice::new("a")));
        assert!(choice.supports_selection());
        assert!(!TableItem::label(1, "Note").supports_selection());
    }
}
