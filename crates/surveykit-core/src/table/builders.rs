//! Constructors that build an item group for each kind of input field.

use std::sync::Arc;

use crate::answer::{AnswerType, BaseType};
use crate::error::CoreError;
use crate::form::{BaseKind, Choice, CollectionKind, DataType, InputField, MeasurementKind, UiHint};
use crate::table::group::InputFieldTableItemGroup;
use crate::table::item::{ChoiceItem, TableItem, TextInputItem};

/// Answer type implied by an input field's declaration.
pub fn default_answer_type(input_field: &InputField, sequence: bool) -> AnswerType {
    let data_type = input_field.data_type;
    let mut answer_type = AnswerType::new(data_type.default_answer_base_type());
    if sequence {
        answer_type = answer_type.with_sequence();
    }
    if data_type.is_fraction() {
        answer_type = answer_type.with_form_data_type(data_type);
    }
    if let Some(format) = input_field.date_range().and_then(|r| r.result_format.clone()) {
        answer_type = answer_type.with_date_format(format);
    }
    if let Some(unit) = input_field.number_range().and_then(|r| r.unit.clone()) {
        answer_type = answer_type.with_unit(unit);
    }
    answer_type
}

impl InputFieldTableItemGroup {
    /// Pick the group kind appropriate to the field's data type.
    pub fn for_input_field(
        beginning_row_index: usize,
        input_field: impl Into<Arc<InputField>>,
    ) -> Result<Self, CoreError> {
        let input_field = input_field.into();
        let ui_hint = input_field.effective_ui_hint();
        let group = match input_field.data_type {
            DataType::Collection(CollectionKind::MultipleComponent, _) => {
                Self::multiple_component(beginning_row_index, input_field, ui_hint)
            }
            DataType::Collection(_, _) => {
                Self::choice_picker(beginning_row_index, input_field, ui_hint, None)
            }
            DataType::Measurement(_) => {
                return Self::measurement(beginning_row_index, input_field, ui_hint)
            }
            DataType::Base(BaseKind::Boolean) => {
                Self::boolean(beginning_row_index, input_field, ui_hint)
            }
            DataType::Base(BaseKind::Date) => Self::date(beginning_row_index, input_field, ui_hint),
            DataType::Base(BaseKind::String) if !input_field.choices.is_empty() => {
                Self::choice_picker(beginning_row_index, input_field, ui_hint, None)
            }
            DataType::Base(BaseKind::String) => {
                Self::text_field(beginning_row_index, input_field, ui_hint)
            }
            DataType::Base(_) => Self::number(beginning_row_index, input_field, ui_hint),
        };
        Ok(group)
    }

    /// Free text entry.
    pub fn text_field(beginning_row_index: usize, input_field: Arc<InputField>, ui_hint: UiHint) -> Self {
        let answer_type = default_answer_type(&input_field, false);
        Self::single_row(beginning_row_index, input_field, ui_hint, answer_type)
    }

    /// Single or multiple choice. Choices become rows when the hint is a
    /// list-selection hint; otherwise a single picker row is used.
    pub fn choice_picker(
        beginning_row_index: usize,
        input_field: Arc<InputField>,
        ui_hint: UiHint,
        answer_type: Option<AnswerType>,
    ) -> Self {
        let is_list = input_field.data_type.list_selection_hints().contains(&ui_hint)
            && !input_field.choices.is_empty();
        let single_selection = !(is_list && input_field.data_type.is_multiple_choice());
        let answer_type =
            Arc::new(answer_type.unwrap_or_else(|| default_answer_type(&input_field, !single_selection)));

        let items = if is_list {
            input_field
                .choices
                .iter()
                .enumerate()
                .map(|(index, choice)| {
                    TableItem::choice(
                        beginning_row_index + index,
                        ChoiceItem::new(input_field.clone(), ui_hint, choice.clone()),
                    )
                })
                .collect()
        } else {
            vec![TableItem::text(
                beginning_row_index,
                TextInputItem::new(input_field.clone(), ui_hint, answer_type.clone()),
            )]
        };

        Self::new(beginning_row_index, items, input_field, ui_hint, answer_type)
            .with_single_selection(single_selection)
    }

    /// Yes/no question. Fields without choices get exclusive Yes and No.
    pub fn boolean(beginning_row_index: usize, input_field: Arc<InputField>, ui_hint: UiHint) -> Self {
        let input_field = if input_field.choices.is_empty() {
            let mut field = (*input_field).clone();
            field.choices = vec![
                Choice::new(true).with_text("Yes").exclusive(),
                Choice::new(false).with_text("No").exclusive(),
            ];
            Arc::new(field)
        } else {
            input_field
        };
        Self::choice_picker(
            beginning_row_index,
            input_field,
            ui_hint,
            Some(AnswerType::new(BaseType::Boolean)),
        )
    }

    /// Date entry; the result pattern comes from the field's date range.
    pub fn date(beginning_row_index: usize, input_field: Arc<InputField>, ui_hint: UiHint) -> Self {
        let mut answer_type = AnswerType::new(BaseType::Date);
        if let Some(format) = input_field.date_range().and_then(|r| r.result_format.clone()) {
            answer_type = answer_type.with_date_format(format);
        }
        Self::single_row(beginning_row_index, input_field, ui_hint, answer_type)
    }

    /// Integer, decimal, fraction or year entry.
    pub fn number(beginning_row_index: usize, input_field: Arc<InputField>, ui_hint: UiHint) -> Self {
        let answer_type = default_answer_type(&input_field, false);
        Self::single_row(beginning_row_index, input_field, ui_hint, answer_type)
    }

    /// Entry made of several components joined by the field's separator.
    pub fn multiple_component(
        beginning_row_index: usize,
        input_field: Arc<InputField>,
        ui_hint: UiHint,
    ) -> Self {
        let mut answer_type = default_answer_type(&input_field, true);
        if let Some(separator) = &input_field.separator {
            answer_type = answer_type.with_separator(separator.clone());
        }
        Self::single_row(beginning_row_index, input_field, ui_hint, answer_type)
    }

    /// Human measurement: height in cm, weight in kg, blood pressure as a
    /// `/`-separated pair.
    pub fn measurement(
        beginning_row_index: usize,
        input_field: Arc<InputField>,
        ui_hint: UiHint,
    ) -> Result<Self, CoreError> {
        let DataType::Measurement(kind) = input_field.data_type else {
            return Err(CoreError::UnsupportedOperation {
                identifier: input_field.identifier.clone(),
                operation: "measurement",
            });
        };

        let declared_unit = input_field.number_range().and_then(|r| r.unit.clone());
        let mut answer_type = AnswerType::new(BaseType::Decimal);
        match kind {
            MeasurementKind::Height => {
                answer_type = answer_type.with_unit(declared_unit.unwrap_or_else(|| "cm".into()));
            }
            MeasurementKind::Weight => {
                answer_type = answer_type.with_unit(declared_unit.unwrap_or_else(|| "kg".into()));
            }
            MeasurementKind::BloodPressure => {
                answer_type = answer_type.with_sequence().with_separator("/");
                if let Some(unit) = declared_unit {
                    answer_type = answer_type.with_unit(unit);
                }
            }
        }
        Ok(Self::single_row(beginning_row_index, input_field, ui_hint, answer_type))
    }

    fn single_row(
        beginning_row_index: usize,
        input_field: Arc<InputField>,
        ui_hint: UiHint,
        answer_type: AnswerType,
    ) -> Self {
        let answer_type = Arc::new(answer_type);
        let item = TextInputItem::new(input_field.clone(), ui_hint, answer_type.clone());
        Self::new(
            beginning_row_index,
            vec![TableItem::text(beginning_row_index, item)],
            input_field,
            ui_hint,
            answer_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{InputRange, NumberRange};
    use crate::result::AnswerResult;
    use crate::table::group::ItemGroup;
    use crate::value::AnswerValue;
    use serde_json::json;

    fn choice_field(kind: CollectionKind) -> InputField {
        InputField::new("color", DataType::Collection(kind, BaseKind::String)).with_choices(vec![
            Choice::new("a").with_text("A"),
            Choice::new("b").with_text("B"),
            Choice::new("c").with_text("C"),
            Choice::none_of_the_above("None"),
        ])
    }

    fn group(field: InputField, beginning_row_index: usize) -> InputFieldTableItemGroup {
        InputFieldTableItemGroup::for_input_field(beginning_row_index, field).unwrap()
    }

    #[test]
    fn test_single_selection_replaces_and_toggles() {
        let mut g = group(choice_field(CollectionKind::SingleChoice), 2);
        assert!(g.single_selection());
        assert_eq!(g.items().len(), 4);

        g.select(2).unwrap();
        g.select(3).unwrap();
        assert_eq!(g.selected_rows(), vec![1]);
        assert_eq!(g.answer(), Some(&AnswerValue::from("b")));

        g.select(3).unwrap();
        assert!(g.selected_rows().is_empty());
        assert_eq!(g.answer(), None);
    }

    #[test]
    fn test_multiple_selection_accumulates_in_row_order() {
        let mut g = group(choice_field(CollectionKind::MultipleChoice), 0);
        assert!(!g.single_selection());

        g.select(2).unwrap();
        g.select(0).unwrap();
        assert_eq!(
            g.answer(),
            Some(&AnswerValue::Sequence(vec!["a".into(), "c".into()]))
        );

        g.select(0).unwrap();
        assert_eq!(g.answer(), Some(&AnswerValue::Sequence(vec!["c".into()])));
    }

    #[test]
    fn test_exclusive_choice_clears_others() {
        let mut g = group(choice_field(CollectionKind::MultipleChoice), 0);
        g.select(0).unwrap();
        g.select(1).unwrap();

        g.select(3).unwrap();
        assert_eq!(g.selected_rows(), vec![3]);
        assert_eq!(g.answer(), Some(&AnswerValue::Sequence(vec![])));

        // Picking a regular choice afterwards clears the exclusive one.
        g.select(0).unwrap();
        assert_eq!(g.selected_rows(), vec![0]);
    }

    #[test]
    fn test_select_out_of_range() {
        let mut g = group(choice_field(CollectionKind::SingleChoice), 5);
        assert!(matches!(g.select(4), Err(CoreError::InvalidAnswer { .. })));
        assert!(g.select(9).is_err());
    }

    #[test]
    fn test_select_on_text_group_is_unsupported() {
        let mut g = group(InputField::new("name", DataType::Base(BaseKind::String)), 0);
        assert!(matches!(
            g.select(0),
            Err(CoreError::UnsupportedOperation { operation: "select", .. })
        ));
    }

    #[test]
    fn test_answer_validity() {
        let mut required = group(InputField::new("name", DataType::Base(BaseKind::String)), 0);
        assert!(!required.is_answer_valid());
        required.set_answer(Some("Ada".into())).unwrap();
        assert!(required.is_answer_valid());
        assert_eq!(
            required.items()[0].as_text().unwrap().answer(),
            Some(&AnswerValue::from("Ada"))
        );

        let optional = group(
            InputField::new("nickname", DataType::Base(BaseKind::String)).optional(),
            0,
        );
        assert!(optional.is_answer_valid());
    }

    #[test]
    fn test_invalid_answer_leaves_state_unchanged() {
        let field = InputField::new("age", DataType::Base(BaseKind::Integer))
            .with_range(InputRange::Number(NumberRange::new(Some(18.0), Some(99.0))));
        let mut g = group(field, 0);
        g.set_answer(Some("30".into())).unwrap();

        assert!(g.set_answer(Some("12".into())).is_err());
        assert_eq!(g.answer(), Some(&AnswerValue::Integer(30)));
    }

    #[test]
    fn test_seed_from_result_selects_rows() {
        let mut g = group(choice_field(CollectionKind::MultipleChoice), 0);
        let result = AnswerResult::new("color", g.answer_type().clone(), json!(["a", "c"]));

        g.set_answer_from_result(&result).unwrap();
        assert_eq!(g.selected_rows(), vec![0, 2]);
        assert_eq!(
            g.answer(),
            Some(&AnswerValue::Sequence(vec!["a".into(), "c".into()]))
        );
    }

    #[test]
    fn test_seed_from_result_with_wrong_type() {
        let mut g = group(choice_field(CollectionKind::SingleChoice), 0);
        let result = AnswerResult::new("color", AnswerType::new(BaseType::Integer), json!(1));

        assert!(matches!(
            g.set_answer_from_result(&result),
            Err(CoreError::InvalidType { .. })
        ));
        assert_eq!(g.answer(), None);
    }

    #[test]
    fn test_boolean_group_defaults() {
        let mut g = group(InputField::new("smoker", DataType::Base(BaseKind::Boolean)), 0);
        assert_eq!(g.items().len(), 2);
        assert_eq!(g.answer_type(), &AnswerType::new(BaseType::Boolean));

        g.select(1).unwrap();
        assert_eq!(g.answer(), Some(&AnswerValue::Boolean(false)));
        assert_eq!(g.to_answer_result().unwrap().value, json!(false));
    }

    #[test]
    fn test_choice_picker_without_list_hint_uses_picker_row() {
        let field = choice_field(CollectionKind::SingleChoice).with_ui_hint(UiHint::Picker);
        let mut g = group(field, 0);
        assert_eq!(g.items().len(), 1);
        assert!(g.select(0).is_err());
        g.set_answer(Some("b".into())).unwrap();
        assert_eq!(g.answer(), Some(&AnswerValue::from("b")));
    }

    #[test]
    fn test_measurement_groups() {
        let bp = group(
            InputField::new("bp", DataType::Measurement(MeasurementKind::BloodPressure)),
            0,
        );
        assert!(bp.answer_type().is_sequence());
        assert_eq!(bp.answer_type().sequence_separator.as_deref(), Some("/"));

        let mut bp = bp;
        bp.set_answer(Some("120/80".into())).unwrap();
        assert_eq!(bp.to_answer_result().unwrap().value, json!([120.0, 80.0]));

        let weight = group(
            InputField::new("weight", DataType::Measurement(MeasurementKind::Weight)),
            0,
        );
        assert_eq!(weight.answer_type().unit.as_deref(), Some("kg"));

        let not_measurement = Arc::new(InputField::new("x", DataType::Base(BaseKind::Decimal)));
        assert!(InputFieldTableItemGroup::measurement(0, not_measurement, UiHint::Picker).is_err());
    }

    #[test]
    fn test_fraction_choices() {
        let field = InputField::new(
            "portion",
            DataType::Collection(CollectionKind::MultipleChoice, BaseKind::Fraction),
        )
        .with_choices(vec![
            Choice::new(AnswerValue::Fraction(crate::value::Fraction::new(1, 4).unwrap())),
            Choice::new(AnswerValue::Fraction(crate::value::Fraction::new(1, 2).unwrap())),
        ]);
        let mut g = group(field, 0);
        g.select(0).unwrap();
        g.select(1).unwrap();
        assert_eq!(g.to_answer_result().unwrap().value, json!([0.25, 0.5]));
    }
}
