//! Item groups: per-question answer and selection state.

use std::sync::Arc;

use tracing::debug;

use crate::answer::AnswerType;
use crate::error::CoreError;
use crate::form::{InputField, UiHint};
use crate::ids::GroupId;
use crate::result::AnswerResult;
use crate::table::item::TableItem;
use crate::value::AnswerValue;

/// Common view of a group of rows.
pub trait ItemGroup {
    /// Stable identity token.
    fn id(&self) -> &GroupId;

    /// Rows in display order.
    fn items(&self) -> &[TableItem];

    /// Row index of the first row.
    fn beginning_row_index(&self) -> usize;

    /// Whether the group's answer may be committed.
    fn is_answer_valid(&self) -> bool {
        true
    }
}

/// A group of rows with no associated input field.
#[derive(Debug, Clone)]
pub struct TableItemGroup {
    id: GroupId,
    beginning_row_index: usize,
    items: Vec<TableItem>,
}

impl TableItemGroup {
    pub fn new(beginning_row_index: usize, items: Vec<TableItem>) -> Self {
        Self {
            id: GroupId::generate(),
            beginning_row_index,
            items,
        }
    }
}

impl ItemGroup for TableItemGroup {
    fn id(&self) -> &GroupId {
        &self.id
    }

    fn items(&self) -> &[TableItem] {
        &self.items
    }

    fn beginning_row_index(&self) -> usize {
        self.beginning_row_index
    }
}

/// A group representing a single input field.
///
/// The group owns the authoritative answer. A lone text row keeps an echo of
/// it that is refreshed on every `set_answer`.
#[derive(Debug, Clone)]
pub struct InputFieldTableItemGroup {
    id: GroupId,
    beginning_row_index: usize,
    items: Vec<TableItem>,
    input_field: Arc<InputField>,
    ui_hint: UiHint,
    answer_type: Arc<AnswerType>,
    single_selection: bool,
    answer: Option<AnswerValue>,
}

impl InputFieldTableItemGroup {
    /// Create a group from prepared rows.
    pub fn new(
        beginning_row_index: usize,
        items: Vec<TableItem>,
        input_field: Arc<InputField>,
        ui_hint: UiHint,
        answer_type: Arc<AnswerType>,
    ) -> Self {
        Self {
            id: GroupId::generate(),
            beginning_row_index,
            items,
            input_field,
            ui_hint,
            answer_type,
            single_selection: true,
            answer: None,
        }
    }

    /// Builder method to allow multiple selected choices.
    pub fn with_single_selection(mut self, single_selection: bool) -> Self {
        self.single_selection = single_selection;
        self
    }

    /// Identifier of the input field.
    pub fn identifier(&self) -> &str {
        &self.input_field.identifier
    }

    pub fn input_field(&self) -> &InputField {
        &self.input_field
    }

    pub fn ui_hint(&self) -> UiHint {
        self.ui_hint
    }

    pub fn answer_type(&self) -> &AnswerType {
        &self.answer_type
    }

    pub fn single_selection(&self) -> bool {
        self.single_selection
    }

    /// The current answer; `None` is the absence marker.
    pub fn answer(&self) -> Option<&AnswerValue> {
        self.answer
            .as_ref()
            .or_else(|| self.items.first().and_then(|i| i.as_text()).and_then(|t| t.answer()))
    }

    /// Validate and store a new answer. On error the stored answer is left
    /// unchanged.
    pub fn set_answer(&mut self, value: Option<AnswerValue>) -> Result<(), CoreError> {
        if self.items.len() == 1 {
            if let Some(text_item) = self.items[0].as_text_mut() {
                let validated = text_item.validate(value)?;
                text_item.set_cached_answer(validated.clone());
                self.answer = validated;
                return Ok(());
            }
        }

        // Multi-row groups validate at the selection layer.
        self.answer = value;
        Ok(())
    }

    /// Seed the answer from a previously recorded result.
    ///
    /// Choice rows are re-selected to match the decoded answer.
    pub fn set_answer_from_result(&mut self, result: &AnswerResult) -> Result<(), CoreError> {
        if result.answer_type != *self.answer_type {
            return Err(CoreError::InvalidType {
                identifier: self.identifier().to_string(),
                expected: self.answer_type.to_string(),
                found: result.answer_type.to_string(),
            });
        }

        let value = self.answer_type.decode(&result.value)?;
        self.set_answer(value)?;

        let answer = self.answer.clone();
        for item in self.items.iter_mut() {
            if let Some(choice_item) = item.as_choice_mut() {
                choice_item.selected = choice_item.choice.matches_answer(answer.as_ref());
            }
        }
        Ok(())
    }

    /// Toggle the choice row at absolute `row_index` and recompute the answer.
    ///
    /// Single selection and exclusive choices clear the other rows; other
    /// choices in a multiple-selection group accumulate in row order.
    pub fn select(&mut self, row_index: usize) -> Result<(), CoreError> {
        if self.items.is_empty() || !self.items.iter().all(TableItem::supports_selection) {
            return Err(CoreError::UnsupportedOperation {
                identifier: self.identifier().to_string(),
                operation: "select",
            });
        }

        let index = row_index
            .checked_sub(self.beginning_row_index)
            .filter(|&index| index < self.items.len())
            .ok_or_else(|| CoreError::InvalidAnswer {
                identifier: self.identifier().to_string(),
                reason: format!("row {row_index} is not part of this group"),
            })?;

        let choices: Vec<_> = self.items.iter().filter_map(TableItem::as_choice).collect();
        let toggled = choices[index];
        let deselect_others = self.single_selection || toggled.choice.is_exclusive;
        let selected = !toggled.selected;

        let mut selection = Vec::with_capacity(choices.len());
        let mut answers = Vec::new();
        for (ii, item) in choices.iter().enumerate() {
            let is_selected = if deselect_others
                || ii == index
                || item.choice.is_exclusive
                || item.choice.value.is_none()
            {
                ii == index && selected
            } else {
                item.selected
            };
            if is_selected {
                if let Some(value) = &item.choice.value {
                    answers.push(value.clone());
                }
            }
            selection.push(is_selected);
        }

        let answer = if self.single_selection {
            answers.into_iter().next()
        } else {
            Some(AnswerValue::Sequence(answers))
        };
        self.set_answer(answer)?;

        for (item, is_selected) in self.items.iter_mut().zip(selection) {
            if let Some(choice_item) = item.as_choice_mut() {
                choice_item.selected = is_selected;
            }
        }

        debug!(field = %self.identifier(), row = row_index, selected, "Choice toggled");
        Ok(())
    }

    /// Indexes (relative to the group) of the selected rows.
    pub fn selected_rows(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.as_choice().map(|c| c.selected).unwrap_or(false))
            .map(|(index, _)| index)
            .collect()
    }

    /// Encode the current answer into a result record.
    pub fn to_answer_result(&self) -> Result<AnswerResult, CoreError> {
        let value = self.answer_type.encode_answer(self.answer())?;
        Ok(AnswerResult::new(
            self.identifier(),
            (*self.answer_type).clone(),
            value,
        ))
    }
}

impl ItemGroup for InputFieldTableItemGroup {
    fn id(&self) -> &GroupId {
        &self.id
    }

    fn items(&self) -> &[TableItem] {
        &self.items
    }

    fn beginning_row_index(&self) -> usize {
        self.beginning_row_index
    }

    /// A required field is valid only once it has an answer.
    fn is_answer_valid(&self) -> bool {
        let is_optional = self
            .items
            .iter()
            .fold(self.input_field.is_optional, |optional, item| {
                optional && item.is_optional()
            });
        is_optional || self.answer().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_group_is_always_valid() {
        let group = TableItemGroup::new(
            4,
            vec![TableItem::label(4, "Read carefully"), TableItem::label(5, "Then continue")],
        );
        assert_eq!(group.beginning_row_index(), 4);
        assert_eq!(group.items().len(), 2);
        assert!(group.is_answer_valid());
        assert!(!group.items().iter().any(TableItem::supports_selection));

        let other = TableItemGroup::new(0, Vec::new());
        assert!(other.is_answer_valid());
        assert_ne!(group.id(), other.id());
    }
}
