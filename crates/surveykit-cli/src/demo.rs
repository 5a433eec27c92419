//! Built-in demo task and its text rendering.

use async_trait::async_trait;
use surveykit_core::{
    AsyncActionConfiguration, AsyncActionCoordinator, BaseKind, Choice, CollectionKind,
    ConditionalStepNavigator, CoreError, DataType, InputField, InputRange, ItemGroup,
    MeasurementKind, NavigationRule, NumberRange, PermissionRequester, PermissionType,
    ResultPredicate, Step, StepKind, Task, TableItemKind, TaskRun,
};

/// Build the demo task: instruction, a choice, a number shown only to people
/// who exercise, blood pressure, a short walk and a completion screen.
pub fn demo_task() -> Result<Task, CoreError> {
    let frequency = InputField::new(
        "frequency",
        DataType::Collection(CollectionKind::SingleChoice, BaseKind::String),
    )
    .with_prompt("How often do you exercise?")
    .with_choices(vec![
        Choice::new("never").with_text("Never"),
        Choice::new("weekly").with_text("Weekly"),
        Choice::new("daily").with_text("Daily"),
    ]);

    let minutes = InputField::new("minutes", DataType::Base(BaseKind::Integer))
        .with_prompt("Minutes per session")
        .with_range(InputRange::Number(
            NumberRange::new(Some(1.0), Some(600.0)).with_unit("min"),
        ));

    let blood_pressure = InputField::new(
        "bloodPressure",
        DataType::Measurement(MeasurementKind::BloodPressure),
    )
    .with_prompt("Blood pressure (systolic/diastolic)")
    .optional();

    let navigator = ConditionalStepNavigator::new(vec![
        Step::instruction("welcome").with_title("Welcome to the activity survey"),
        Step::form("activity", vec![frequency]).with_rule(NavigationRule::new(
            ResultPredicate::equals("frequency", "never"),
            "vitals",
        )),
        Step::form("duration", vec![minutes]),
        Step::form("vitals", vec![blood_pressure]),
        Step::active("walk", Some(30.0)).with_title("Walk for 30 seconds"),
        Step::completion("done").with_title("Thank you"),
    ])?;

    let coordinator = AsyncActionCoordinator::new(vec![
        AsyncActionConfiguration::new("heartRate"),
        AsyncActionConfiguration::new("motion")
            .starting_at("walk")
            .stopping_after("walk")
            .with_permission(PermissionType::Motion),
    ]);

    Ok(Task::new("activitySurvey", navigator, coordinator)?.with_schema_info("revision", "1"))
}

/// Requester that answers every prompt the same way.
pub struct FixedRequester {
    pub grant: bool,
}

#[async_trait]
impl PermissionRequester for FixedRequester {
    async fn request(&self, _permission: PermissionType) -> Result<bool, CoreError> {
        Ok(self.grant)
    }
}

/// Print the step graph, descending into sections.
pub fn print_outline(navigator: &ConditionalStepNavigator, depth: usize) {
    let indent = "  ".repeat(depth);
    for step in navigator.steps() {
        let kind = match &step.kind {
            StepKind::Instruction => "instruction".to_string(),
            StepKind::Form { input_fields } => format!("form ({} fields)", input_fields.len()),
            StepKind::Active { duration_secs: Some(secs) } => format!("active ({secs}s)"),
            StepKind::Active { duration_secs: None } => "active".to_string(),
            StepKind::Section(_) => "section".to_string(),
            StepKind::Completion => "completion".to_string(),
        };
        println!("{indent}{}: {kind}", step.identifier);

        for field in step.input_fields() {
            let optional = if field.is_optional { ", optional" } else { "" };
            println!("{indent}  - {} [{:?}{optional}]", field.identifier, field.data_type);
        }
        for rule in &step.navigation.rules {
            println!("{indent}  -> {} if {:?}", rule.skip_to, rule.predicate);
        }
        if let Some(next) = &step.navigation.next_step {
            println!("{indent}  -> {next}");
        }
        if let Some(section) = step.as_section() {
            print_outline(section, depth + 1);
        }
    }
}

/// Print the current step and its rows.
pub fn print_step(run: &TaskRun) {
    let Some(step) = run.current_step() else {
        return;
    };

    let progress = run
        .progress()
        .map(|p| {
            let marker = if p.is_estimated { "~" } else { "" };
            format!("[{}/{}{marker}] ", p.current, p.total)
        })
        .unwrap_or_default();
    let title = step.title.as_deref().unwrap_or(step.identifier.as_str());
    println!();
    println!("{progress}{title}");

    for group in run.item_groups() {
        let prompt = group
            .input_field()
            .prompt
            .as_deref()
            .unwrap_or(group.identifier());
        println!("  {prompt}");

        for item in group.items() {
            match &item.kind {
                TableItemKind::Choice(choice_item) => {
                    let mark = if choice_item.selected { "x" } else { " " };
                    let text = choice_item.choice.text.as_deref().unwrap_or("");
                    println!("    #{} [{mark}] {text}", item.row_index);
                }
                TableItemKind::Text(text_item) => {
                    println!("    > {}", text_item.answer_type);
                }
                TableItemKind::Label(text) => println!("    {text}"),
            }
        }

        if let Ok(value) = group.answer_type().encode_answer(group.answer()) {
            if !value.is_null() {
                println!("    = {value}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use surveykit_core::{RunConfig, StepNavigator, TaskResult};

    #[test]
    fn test_demo_task_is_valid() {
        let task = demo_task().unwrap();
        assert_eq!(task.navigator.steps().len(), 6);
        assert!(!task.navigator.is_linear());
    }

    #[test]
    fn test_demo_skips_duration_for_never() {
        let task = Arc::new(demo_task().unwrap());
        let mut run = TaskRun::new(Arc::clone(&task), RunConfig::default());
        run.start().unwrap();
        run.go_forward().unwrap();
        run.item_group_mut("frequency").unwrap().select(0).unwrap();
        run.go_forward().unwrap();
        assert_eq!(run.current_step().unwrap().identifier.as_str(), "vitals");

        let empty = TaskResult::new("activitySurvey");
        assert!(task.navigator.step("duration").is_some());
        assert!(task.navigator.has_step_after(None, &empty));
    }
}
