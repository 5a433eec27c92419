//! A single participant's pass through a task.
//!
//! `TaskRun` owns the mutable state of a run: the position in the step
//! graph (one frame per entered section), the result set of each frame,
//! the item groups of the current form and the set of running async
//! actions. Every transition returns a [`StepChange`] describing what the
//! host should show and which background actions to start or stop.
//!
//! All mutation goes through `&mut self`; callers serialize access.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::async_action::AsyncActionConfiguration;
use crate::config::RunConfig;
use crate::error::CoreError;
use crate::ids::{RunId, StepId};
use crate::navigator::{ConditionalStepNavigator, Progress, StepNavigator};
use crate::result::{AnswerResult, CollectionResult, ResultRecord, ScopedResults, StepResult, TaskResult};
use crate::status::RunStatus;
use crate::step::Step;
use crate::table::{InputFieldTableItemGroup, ItemGroup};
use crate::task::Task;

/// Outcome of a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepChange {
    /// The step now shown, `None` once the run has ended.
    pub step: Option<StepId>,
    pub actions_to_start: Vec<AsyncActionConfiguration>,
    pub actions_to_stop: Vec<AsyncActionConfiguration>,
    pub is_finished: bool,
}

/// Position within one step collection.
#[derive(Debug, Clone)]
struct Frame {
    navigator: Arc<ConditionalStepNavigator>,
    current: Option<StepId>,
    entered_at: DateTime<Utc>,
}

impl Frame {
    fn new(navigator: Arc<ConditionalStepNavigator>, current: Option<StepId>) -> Self {
        Self {
            navigator,
            current,
            entered_at: Utc::now(),
        }
    }
}

/// Run state that a failed transition restores.
#[derive(Debug, Clone)]
struct Snapshot {
    frames: Vec<Frame>,
    results: Vec<TaskResult>,
    running_actions: Vec<AsyncActionConfiguration>,
    status: RunStatus,
    has_entered_step: bool,
    item_groups: Vec<InputFieldTableItemGroup>,
}

/// A run of a [`Task`].
#[derive(Debug)]
pub struct TaskRun {
    task: Arc<Task>,
    config: RunConfig,
    run_id: RunId,
    status: RunStatus,
    frames: Vec<Frame>,
    /// One result set per frame; the first is the task result.
    results: Vec<TaskResult>,
    item_groups: Vec<InputFieldTableItemGroup>,
    running_actions: Vec<AsyncActionConfiguration>,
    previous_result: Option<TaskResult>,
    has_entered_step: bool,
}

impl TaskRun {
    /// Create a run. Nothing is shown until [`TaskRun::start`].
    pub fn new(task: Arc<Task>, config: RunConfig) -> Self {
        let run_id = RunId::generate();
        let result = TaskResult::new(task.identifier.clone())
            .with_run_id(run_id.clone())
            .with_schema_info(task.schema_info.clone());
        let root = Frame::new(Arc::clone(&task.navigator), None);
        Self {
            task,
            config,
            run_id,
            status: RunStatus::NotStarted,
            frames: vec![root],
            results: vec![result],
            item_groups: Vec::new(),
            running_actions: Vec::new(),
            previous_result: None,
            has_entered_step: false,
        }
    }

    /// Builder method to seed answers from an earlier run of the task.
    pub fn with_previous_result(mut self, result: TaskResult) -> Self {
        self.previous_result = Some(result);
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// The task result. Sections appear once they are completed.
    pub fn result(&self) -> &TaskResult {
        &self.results[0]
    }

    /// Consume the run and return the task result.
    pub fn into_result(mut self) -> TaskResult {
        self.results.swap_remove(0)
    }

    /// Actions started and not yet stopped, in start order.
    pub fn running_actions(&self) -> &[AsyncActionConfiguration] {
        &self.running_actions
    }

    /// The step currently shown.
    pub fn current_step(&self) -> Option<&Step> {
        if self.status != RunStatus::Running {
            return None;
        }
        let frame = self.frames.last()?;
        frame
            .current
            .as_ref()
            .and_then(|id| frame.navigator.step(id.as_str()))
    }

    /// Identifiers of the enclosing sections followed by the current step.
    pub fn current_path(&self) -> Vec<&StepId> {
        self.frames.iter().filter_map(|f| f.current.as_ref()).collect()
    }

    /// Progress within the innermost step collection.
    pub fn progress(&self) -> Option<Progress> {
        let frame = self.frames.last()?;
        let current = frame.current.as_ref()?;
        if self.status != RunStatus::Running {
            return None;
        }
        frame.navigator.progress(current, &self.lookup())
    }

    /// Item groups of the current form step, one per input field.
    pub fn item_groups(&self) -> &[InputFieldTableItemGroup] {
        &self.item_groups
    }

    /// The item group for an input field of the current step.
    pub fn item_group_mut(&mut self, identifier: &str) -> Option<&mut InputFieldTableItemGroup> {
        self.item_groups.iter_mut().find(|g| g.identifier() == identifier)
    }

    /// Whether every item group may be committed.
    pub fn is_answer_valid(&self) -> bool {
        self.item_groups.iter().all(|g| g.is_answer_valid())
    }

    /// Whether `go_back` would move.
    pub fn can_go_back(&self) -> bool {
        if self.status != RunStatus::Running || !self.config.allow_backward {
            return false;
        }
        self.frames.iter().enumerate().rev().any(|(depth, frame)| {
            frame.navigator.allows_backward()
                && frame
                    .current
                    .as_ref()
                    .map(|current| frame.navigator.has_step_before(current, &self.lookup_at(depth)))
                    .unwrap_or(false)
        })
    }

    /// Show the first step.
    pub fn start(&mut self) -> Result<StepChange, CoreError> {
        if self.status != RunStatus::NotStarted {
            return Err(self.unsupported("start"));
        }
        info!(task = %self.task.identifier, run_id = %self.run_id, "Starting task run");
        let snapshot = self.snapshot();
        self.status = RunStatus::Running;

        let mut change = StepChange::default();
        let entered = self
            .advance(&mut change)
            .and_then(|()| self.enter_current(change));
        entered.map_err(|e| self.restore(snapshot, e))
    }

    /// Commit the current step and move to the next one.
    ///
    /// With `require_valid_answers`, fails with `InvalidAnswer` while any
    /// item group is invalid. On error the run is left where it was.
    pub fn go_forward(&mut self) -> Result<StepChange, CoreError> {
        self.ensure_running("go_forward")?;
        if self.config.require_valid_answers {
            if let Some(group) = self.item_groups.iter().find(|g| !g.is_answer_valid()) {
                return Err(CoreError::InvalidAnswer {
                    identifier: group.identifier().to_string(),
                    reason: "an answer is required".to_string(),
                });
            }
        }
        self.forward()
    }

    /// Clear the answers of the current step, commit it and move on.
    pub fn skip_forward(&mut self) -> Result<StepChange, CoreError> {
        self.ensure_running("skip_forward")?;
        let snapshot = self.snapshot();
        let skipped = self
            .item_groups
            .iter_mut()
            .try_for_each(|group| group.set_answer(None))
            .and_then(|()| self.try_forward());
        skipped.map_err(|e| self.restore(snapshot, e))
    }

    /// Return to the previous step along the path taken.
    pub fn go_back(&mut self) -> Result<StepChange, CoreError> {
        self.ensure_running("go_back")?;
        if !self.config.allow_backward {
            return Err(self.unsupported("go_back"));
        }

        let snapshot = self.snapshot();
        match self.retreat() {
            Ok(true) => {}
            Ok(false) => {
                let error = self.unsupported("go_back");
                return Err(self.restore(snapshot, error));
            }
            Err(e) => return Err(self.restore(snapshot, e)),
        }
        debug!(step = ?self.frames.last().and_then(|f| f.current.as_ref()), "Moved back");
        self.enter_current(StepChange::default())
            .map_err(|e| self.restore(snapshot, e))
    }

    /// End the run. Every running action is reported for stopping.
    pub fn cancel(&mut self) -> StepChange {
        if self.status.is_terminal() {
            return StepChange {
                is_finished: true,
                ..StepChange::default()
            };
        }
        info!(task = %self.task.identifier, run_id = %self.run_id, "Task run cancelled");
        self.status = RunStatus::Cancelled;
        self.item_groups.clear();
        self.results[0].finish();
        StepChange {
            step: None,
            actions_to_start: Vec::new(),
            actions_to_stop: std::mem::take(&mut self.running_actions),
            is_finished: true,
        }
    }

    fn forward(&mut self) -> Result<StepChange, CoreError> {
        let snapshot = self.snapshot();
        self.try_forward().map_err(|e| self.restore(snapshot, e))
    }

    fn try_forward(&mut self) -> Result<StepChange, CoreError> {
        self.commit_current()?;

        let mut change = StepChange::default();
        if self.frames.len() == 1 {
            if let Some(leaving) = self.root_current() {
                self.stop_actions_at(&leaving, &mut change);
            }
        }
        self.advance(&mut change)?;
        self.enter_current(change)
    }

    /// Record the current step in the innermost result set.
    fn commit_current(&mut self) -> Result<(), CoreError> {
        let Some(frame) = self.frames.last() else {
            return Ok(());
        };
        let Some(step) = frame.current.as_ref().and_then(|id| frame.navigator.step(id.as_str())) else {
            return Ok(());
        };

        let record = if step.input_fields().is_empty() {
            ResultRecord::Step(StepResult::new(step.identifier.clone(), frame.entered_at))
        } else {
            let answers = self
                .item_groups
                .iter()
                .map(|group| {
                    group
                        .to_answer_result()
                        .map(|answer| answer.with_start_date(frame.entered_at))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ResultRecord::Collection(CollectionResult::new(
                step.identifier.clone(),
                frame.entered_at,
                answers,
            ))
        };

        debug!(step = %record.identifier(), "Committing step");
        if let Some(result) = self.results.last_mut() {
            result.append(record);
        }
        Ok(())
    }

    /// Move from the current position to the next step that is not a
    /// section, entering and leaving sections as needed.
    ///
    /// Fails when navigation re-enters a section before any step is shown.
    fn advance(&mut self, change: &mut StepChange) -> Result<(), CoreError> {
        let mut entered_sections: Vec<(usize, StepId)> = Vec::new();
        loop {
            let depth = self.frames.len();
            let Some(frame) = self.frames.last() else {
                return Ok(());
            };
            let navigator = Arc::clone(&frame.navigator);
            let current = frame.current.clone();

            let next = {
                let lookup = self.lookup();
                let transition = navigator.step_after(current.as_ref(), &lookup);
                if let Some(error) = &transition.error {
                    debug!(error = %error, "Ending step collection early");
                }
                transition
                    .step
                    .map(|step| (step.identifier.clone(), step.as_section().cloned()))
            };

            match next {
                Some((identifier, section)) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.current = Some(identifier.clone());
                        frame.entered_at = Utc::now();
                    }
                    if depth == 1 {
                        let is_first_step = !self.has_entered_step;
                        self.start_actions_at(&identifier, is_first_step, change);
                    }
                    self.has_entered_step = true;

                    match section {
                        Some(section) => {
                            let key = (depth, identifier.clone());
                            if entered_sections.contains(&key) {
                                warn!(section = %identifier, "Section re-entered without showing a step");
                                return Err(CoreError::NavigationConfiguration(format!(
                                    "section '{identifier}' loops without showing a step"
                                )));
                            }
                            entered_sections.push(key);
                            debug!(section = %identifier, "Entering section");
                            self.frames.push(Frame::new(section, None));
                            self.results.push(TaskResult::new(identifier.into_inner()));
                        }
                        None => return Ok(()),
                    }
                }
                None if depth > 1 => {
                    self.frames.pop();
                    entered_sections.retain(|(entered_depth, _)| *entered_depth < depth);
                    if let Some(mut section_result) = self.results.pop() {
                        section_result.finish();
                        debug!(section = %section_result.identifier, "Leaving section");
                        if let Some(parent) = self.results.last_mut() {
                            parent.append(ResultRecord::Section(section_result));
                        }
                    }
                    if depth == 2 {
                        if let Some(section) = self.root_current() {
                            self.stop_actions_at(&section, change);
                        }
                    }
                }
                None => {
                    self.finish(change);
                    return Ok(());
                }
            }
        }
    }

    /// Move to the previous step. Returns `false` when there is none.
    fn retreat(&mut self) -> Result<bool, CoreError> {
        loop {
            let depth = self.frames.len();
            let Some(frame) = self.frames.last() else {
                return Ok(false);
            };
            let navigator = Arc::clone(&frame.navigator);
            let Some(current) = frame.current.clone() else {
                return Ok(false);
            };

            let previous = {
                let lookup = self.lookup();
                navigator
                    .step_before(&current, &lookup)
                    .map(|step| (step.identifier.clone(), step.as_section().cloned()))
            };

            match previous {
                Some((identifier, None)) => {
                    self.set_current(identifier);
                    return Ok(true);
                }
                Some((identifier, Some(section))) => {
                    self.set_current(identifier.clone());
                    if self.enter_section_from_end(identifier, section) {
                        return Ok(true);
                    }
                }
                None if depth > 1 => {
                    // Leaving a section backwards discards its partial result.
                    self.frames.pop();
                    self.results.pop();
                }
                None => return Ok(false),
            }
        }
    }

    /// Re-enter a completed section at its last visited step, descending
    /// into nested sections. Returns `false` if an empty section was reached.
    fn enter_section_from_end(
        &mut self,
        mut identifier: StepId,
        mut navigator: Arc<ConditionalStepNavigator>,
    ) -> bool {
        loop {
            let section_result = match self.results.last().and_then(|r| r.record(identifier.as_str())) {
                Some(ResultRecord::Section(result)) => result.clone(),
                _ => TaskResult::new(identifier.as_str()),
            };
            let last = section_result
                .step_history()
                .iter()
                .rev()
                .map(ResultRecord::identifier)
                .find(|id| navigator.step(id).is_some())
                .map(StepId::new)
                .or_else(|| navigator.steps().last().map(|s| s.identifier.clone()));
            let Some(last) = last else {
                return false;
            };

            let nested = navigator.step(last.as_str()).and_then(|s| s.as_section().cloned());
            self.frames.push(Frame::new(Arc::clone(&navigator), Some(last.clone())));
            self.results.push(section_result);

            match nested {
                Some(inner) => {
                    identifier = last;
                    navigator = inner;
                }
                None => return true,
            }
        }
    }

    /// Build the item groups for the step now shown and report the change.
    fn enter_current(&mut self, mut change: StepChange) -> Result<StepChange, CoreError> {
        self.item_groups.clear();
        if self.status != RunStatus::Running {
            change.is_finished = true;
            return Ok(change);
        }

        let Some(frame) = self.frames.last() else {
            return Ok(change);
        };
        let navigator = Arc::clone(&frame.navigator);
        let Some(step) = frame.current.as_ref().and_then(|id| navigator.step(id.as_str())) else {
            return Ok(change);
        };

        let mut groups = Vec::with_capacity(step.input_fields().len());
        let mut row_index = 0;
        for field in step.input_fields() {
            let mut group = InputFieldTableItemGroup::for_input_field(row_index, field.clone())?;
            row_index += group.items().len();

            if let Some(prior) = self.prior_answer(&step.identifier, &field.identifier) {
                match group.set_answer_from_result(&prior) {
                    Ok(()) => {}
                    Err(e) if self.config.discard_mismatched_answers && e.is_recoverable() => {
                        warn!(step = %step.identifier, field = %field.identifier, error = %e, "Discarding prior answer");
                        group = InputFieldTableItemGroup::for_input_field(group.beginning_row_index(), field.clone())?;
                    }
                    Err(e) => return Err(e),
                }
            }
            groups.push(group);
        }
        self.item_groups = groups;

        debug!(step = %step.identifier, groups = self.item_groups.len(), "Showing step");
        change.step = Some(step.identifier.clone());
        Ok(change)
    }

    /// The answer recorded for a field on an earlier visit to `step`, or
    /// in the previous run.
    fn prior_answer(&self, step: &StepId, field: &str) -> Option<AnswerResult> {
        let recorded = self
            .results
            .last()
            .and_then(|r| r.record(step.as_str()))
            .and_then(|record| match record {
                ResultRecord::Collection(collection) => collection.answer(field),
                _ => None,
            });
        recorded
            .or_else(|| self.previous_result.as_ref().and_then(|r| r.answer(field)))
            .cloned()
    }

    fn finish(&mut self, change: &mut StepChange) {
        info!(task = %self.task.identifier, run_id = %self.run_id, "Task run completed");
        self.status = RunStatus::Completed;
        self.results[0].finish();
        change.step = None;
        change.is_finished = true;
        change.actions_to_stop.append(&mut self.running_actions);
    }

    fn start_actions_at(&mut self, step: &StepId, is_first_step: bool, change: &mut StepChange) {
        for action in self.task.coordinator.actions_to_start(step, is_first_step) {
            if self.running_actions.iter().any(|a| a.identifier == action.identifier) {
                continue;
            }
            debug!(action = %action.identifier, step = %step, "Starting async action");
            self.running_actions.push(action.clone());
            change.actions_to_start.push(action.clone());
        }
    }

    fn stop_actions_at(&mut self, step: &StepId, change: &mut StepChange) {
        for action in self.task.coordinator.actions_to_stop(step) {
            if let Some(position) = self.running_actions.iter().position(|a| a.identifier == action.identifier) {
                debug!(action = %action.identifier, step = %step, "Stopping async action");
                change.actions_to_stop.push(self.running_actions.remove(position));
            }
        }
    }

    fn set_current(&mut self, identifier: StepId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.current = Some(identifier);
            frame.entered_at = Utc::now();
        }
    }

    fn root_current(&self) -> Option<StepId> {
        self.frames.first().and_then(|f| f.current.clone())
    }

    /// Results visible from the innermost frame.
    fn lookup(&self) -> ScopedResults<'_> {
        self.lookup_at(self.results.len().saturating_sub(1))
    }

    fn lookup_at(&self, depth: usize) -> ScopedResults<'_> {
        ScopedResults::new(&self.results[depth], &self.results[..depth])
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), CoreError> {
        if self.status == RunStatus::Running {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }

    fn unsupported(&self, operation: &'static str) -> CoreError {
        CoreError::UnsupportedOperation {
            identifier: self.task.identifier.clone(),
            operation,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            frames: self.frames.clone(),
            results: self.results.clone(),
            running_actions: self.running_actions.clone(),
            status: self.status,
            has_entered_step: self.has_entered_step,
            item_groups: self.item_groups.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot, error: CoreError) -> CoreError {
        self.frames = snapshot.frames;
        self.results = snapshot.results;
        self.running_actions = snapshot.running_actions;
        self.status = snapshot.status;
        self.has_entered_step = snapshot.has_entered_step;
        self.item_groups = snapshot.item_groups;
        error
    }
}
