//! Flow controller
//!
//! Sequences step transitions for one active flow at a time, fires the
//! host's hooks and records analytics. The only state it holds is the
//! active-flow cursor; progress lives in the [`FlowStore`].

use std::sync::Arc;

use super::definition::{ActionKind, FlowDefinition, Hook, StepDefinition};
use super::progress::ProgressUpdate;
use super::view::StepView;
use crate::analytics::{AnalyticsEvent, EventKind};
use crate::clock;
use crate::config::{EngineConfig, HookPolicy};
use crate::error::{ConfigError, FlowError, HookKind};
use crate::store::FlowStore;
use crate::variant::Variant;

/// Where the controller is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// No active flow
    Idle,

    /// Showing `step_index` of `flow_id`
    Running { flow_id: String, step_index: usize },
}

/// Outcome of a controller operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to do (idle, unknown flow or step, at a boundary)
    Ignored,

    /// Now showing this step
    Moved { step_index: usize, step_id: String },

    /// Flow finished by completion
    Completed,

    /// Flow ended by skip or dismiss
    Skipped,

    /// Progress discarded
    Reset,

    /// A custom action handler ran
    Custom,
}

struct ActiveFlow {
    definition: Arc<FlowDefinition>,
    step_index: usize,
}

impl ActiveFlow {
    fn step(&self) -> Option<&StepDefinition> {
        self.definition.steps.get(self.step_index)
    }

    fn step_id(&self) -> String {
        self.step().map(|s| s.id.clone()).unwrap_or_default()
    }
}

/// Drives one flow at a time against a shared store
pub struct FlowController {
    store: Arc<FlowStore>,
    active: Option<ActiveFlow>,
    hook_policy: HookPolicy,
    resume_at_saved_step: bool,
}

impl FlowController {
    pub fn new(store: Arc<FlowStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            active: None,
            hook_policy: config.hook_policy,
            resume_at_saved_step: config.resume_at_saved_step,
        }
    }

    /// Open a store from `config` and wrap it
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(FlowStore::open(config)?), config))
    }

    pub fn store(&self) -> &Arc<FlowStore> {
        &self.store
    }

    pub fn state(&self) -> FlowState {
        match &self.active {
            Some(active) => FlowState::Running {
                flow_id: active.definition.id.clone(),
                step_index: active.step_index,
            },
            None => FlowState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_flow(&self) -> Option<&Arc<FlowDefinition>> {
        self.active.as_ref().map(|a| &a.definition)
    }

    pub fn current_step_index(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.step_index)
    }

    pub fn current_step(&self) -> Option<&StepDefinition> {
        self.active.as_ref().and_then(|a| a.step())
    }

    /// Snapshot for presentation adapters
    pub fn current_view(&self) -> Option<StepView> {
        let active = self.active.as_ref()?;
        Some(StepView {
            definition: Arc::clone(&active.definition),
            step_index: active.step_index,
            progress: self.store.progress(&active.definition.id),
        })
    }

    /// Start or resume `flow_id`.
    ///
    /// Any flow already active is replaced. Without an explicit variant the
    /// definition's tag is used. A resumed record keeps its completed steps
    /// and timestamps but loses a previous `skipped` outcome, and an explicit
    /// variant replaces the skipped run's one. Events are tagged with the
    /// record's variant. The cursor restarts at the first step unless
    /// `resume_at_saved_step` is set.
    pub fn start(&mut self, flow_id: &str, variant: Option<Variant>) -> Transition {
        let Some(definition) = self.store.flow(flow_id) else {
            tracing::debug!("Cannot start unregistered flow: {}", flow_id);
            return Transition::Ignored;
        };

        if let Some(previous) = &self.active {
            tracing::debug!("Replacing active flow {} with {}", previous.definition.id, flow_id);
        }

        let record = self
            .store
            .initialize_progress(flow_id, variant.or(definition.variant));

        let step_index = if self.resume_at_saved_step && record.current_step_index < definition.step_count() {
            record.current_step_index
        } else {
            0
        };

        let mut update = ProgressUpdate::new().step_index(step_index);
        if record.skipped {
            update = update.skipped(false).clear_completed_at();
            if variant.is_some() {
                update = update.variant(variant);
            }
        }
        self.store.update_progress(flow_id, update);

        let first_step_id = definition.first_step_id().unwrap_or_default().to_string();
        self.active = Some(ActiveFlow {
            definition,
            step_index,
        });

        self.track(flow_id, &first_step_id, EventKind::Start);

        Transition::Moved {
            step_index,
            step_id: self.active.as_ref().map(|a| a.step_id()).unwrap_or_default(),
        }
    }

    /// Complete the current step and advance, finishing after the last one
    pub fn next(&mut self) -> Result<Transition, FlowError> {
        let Some(active) = &self.active else {
            return Ok(Transition::Ignored);
        };
        let definition = Arc::clone(&active.definition);
        let index = active.step_index;

        if let Some(step) = definition.step_at(index) {
            self.store.complete_step(&definition.id, &step.id);
            self.run_hook(step.on_exit.as_ref(), HookKind::Exit, &definition.id, Some(&step.id))?;
        }

        if definition.is_last_index(index) {
            return self.complete();
        }

        let next_index = index + 1;
        let next_step = &definition.steps[next_index];
        self.move_to(next_index);
        self.run_hook(next_step.on_enter.as_ref(), HookKind::Enter, &definition.id, Some(&next_step.id))?;
        self.track(&definition.id, &next_step.id, EventKind::Next);

        Ok(Transition::Moved {
            step_index: next_index,
            step_id: next_step.id.clone(),
        })
    }

    /// Go back one step; ignored on the first step
    pub fn prev(&mut self) -> Result<Transition, FlowError> {
        let Some(active) = &self.active else {
            return Ok(Transition::Ignored);
        };
        if active.step_index == 0 {
            return Ok(Transition::Ignored);
        }
        let definition = Arc::clone(&active.definition);
        let index = active.step_index;

        if let Some(step) = definition.step_at(index) {
            self.run_hook(step.on_exit.as_ref(), HookKind::Exit, &definition.id, Some(&step.id))?;
        }

        let prev_index = index - 1;
        let prev_step = &definition.steps[prev_index];
        self.move_to(prev_index);
        self.run_hook(prev_step.on_enter.as_ref(), HookKind::Enter, &definition.id, Some(&prev_step.id))?;
        self.track(&definition.id, &prev_step.id, EventKind::Prev);

        Ok(Transition::Moved {
            step_index: prev_index,
            step_id: prev_step.id.clone(),
        })
    }

    /// Abandon the active flow
    pub fn skip(&mut self) -> Result<Transition, FlowError> {
        self.finish(EventKind::Skip)
    }

    /// Finish the active flow as completed
    pub fn complete(&mut self) -> Result<Transition, FlowError> {
        self.finish(EventKind::Complete)
    }

    /// Overlay dismissal: skip semantics, recorded as `dismiss`.
    ///
    /// Ignored unless the active flow allows dismissing on overlay click.
    pub fn dismiss(&mut self) -> Result<Transition, FlowError> {
        match &self.active {
            Some(active) if active.definition.dismiss_on_overlay_click => self.finish(EventKind::Dismiss),
            _ => Ok(Transition::Ignored),
        }
    }

    /// Jump straight to `step_id`. No hooks, no analytics.
    pub fn go_to_step(&mut self, step_id: &str) -> Transition {
        let Some(index) = self
            .active
            .as_ref()
            .and_then(|a| a.definition.position_of(step_id))
        else {
            return Transition::Ignored;
        };

        self.move_to(index);
        Transition::Moved {
            step_index: index,
            step_id: step_id.to_string(),
        }
    }

    /// Discard the active flow's progress without firing hooks
    pub fn reset(&mut self) -> Transition {
        let Some(active) = self.active.take() else {
            return Transition::Ignored;
        };

        self.store.reset_progress(&active.definition.id);
        Transition::Reset
    }

    /// Resolve a step action
    pub fn perform(&mut self, action: &ActionKind) -> Result<Transition, FlowError> {
        match action {
            ActionKind::Next => self.next(),
            ActionKind::Prev => self.prev(),
            ActionKind::Skip => self.skip(),
            ActionKind::Complete => self.complete(),
            ActionKind::Custom(handler) => {
                let (flow_id, step_id) = match &self.active {
                    Some(active) => (active.definition.id.clone(), Some(active.step_id())),
                    None => (String::new(), None),
                };

                match handler.call(self) {
                    Ok(()) => Ok(Transition::Custom),
                    Err(source) => self
                        .hook_failed(HookKind::Action, flow_id, step_id, source)
                        .map(|()| Transition::Custom),
                }
            }
        }
    }

    /// Trigger the `action_index`-th action of the current step
    pub fn trigger_action(&mut self, action_index: usize) -> Result<Transition, FlowError> {
        let Some(active) = &self.active else {
            return Ok(Transition::Ignored);
        };
        let definition = Arc::clone(&active.definition);
        let index = active.step_index;

        match definition
            .step_at(index)
            .and_then(|s| s.actions.get(action_index))
        {
            Some(action) => self.perform(&action.action),
            None => Ok(Transition::Ignored),
        }
    }

    fn finish(&mut self, kind: EventKind) -> Result<Transition, FlowError> {
        let Some(active) = self.active.take() else {
            return Ok(Transition::Ignored);
        };
        let flow_id = active.definition.id.clone();
        let step_id = active.step_id();

        let update = match kind {
            EventKind::Complete => ProgressUpdate::new().completed(true),
            _ => ProgressUpdate::new().skipped(true),
        };
        self.store.update_progress(&flow_id, update.completed_at(clock::now()));
        self.track(&flow_id, &step_id, kind);

        let (hook, hook_kind, transition) = match kind {
            EventKind::Complete => (active.definition.on_complete.as_ref(), HookKind::Complete, Transition::Completed),
            _ => (active.definition.on_skip.as_ref(), HookKind::Skip, Transition::Skipped),
        };

        tracing::debug!("Flow {} ended at {:?} ({})", flow_id, step_id, kind);
        self.run_hook(hook, hook_kind, &flow_id, Some(&step_id))?;
        Ok(transition)
    }

    fn move_to(&mut self, index: usize) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.step_index = index;
        let flow_id = active.definition.id.clone();
        self.store.update_progress(&flow_id, ProgressUpdate::new().step_index(index));
    }

    fn track(&self, flow_id: &str, step_id: &str, kind: EventKind) {
        let variant = self.store.progress(flow_id).and_then(|p| p.variant);
        self.store
            .track_event(AnalyticsEvent::new(flow_id, step_id, kind).with_variant(variant));
    }

    fn run_hook(
        &self,
        hook: Option<&Hook>,
        kind: HookKind,
        flow_id: &str,
        step_id: Option<&str>,
    ) -> Result<(), FlowError> {
        let Some(hook) = hook else {
            return Ok(());
        };

        match hook.call() {
            Ok(()) => Ok(()),
            Err(source) => self.hook_failed(kind, flow_id.to_string(), step_id.map(str::to_string), source),
        }
    }

    fn hook_failed(
        &self,
        hook: HookKind,
        flow_id: String,
        step_id: Option<String>,
        source: anyhow::Error,
    ) -> Result<(), FlowError> {
        match self.hook_policy {
            HookPolicy::Propagate => Err(FlowError::HookFailed {
                flow_id,
                step_id,
                hook,
                source,
            }),
            HookPolicy::LogAndContinue => {
                tracing::warn!("Hook {} failed in flow {} at {:?}: {:#}", hook, flow_id, step_id, source);
                Ok(())
            }
        }
    }
}
