//! Flow and step definitions
//!
//! Definitions are immutable once registered. They can be built in code or
//! deserialized from JSON; hooks and custom actions are code-only.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::controller::FlowController;
use crate::error::FlowError;
use crate::variant::Variant;

type HookFn = dyn Fn() -> anyhow::Result<()> + Send + Sync;
type ActionFn = dyn Fn(&mut FlowController) -> anyhow::Result<()> + Send + Sync;

/// Host-supplied side effect fired on a transition
#[derive(Clone)]
pub struct Hook(Arc<HookFn>);

impl Hook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Hook(..)")
    }
}

/// Handler behind a custom step action
#[derive(Clone)]
pub struct ActionHandler(Arc<ActionFn>);

impl ActionHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut FlowController) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, controller: &mut FlowController) -> anyhow::Result<()> {
        (self.0)(controller)
    }
}

impl std::fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActionHandler(..)")
    }
}

/// How a step is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Tooltip,
    Modal,
    Checklist,
    Spotlight,
}

/// Position of a step relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

/// What a step action does when triggered
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Next,
    Prev,
    Skip,
    Complete,
    #[serde(skip)]
    Custom(ActionHandler),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStyle {
    #[default]
    Primary,
    Secondary,
    Ghost,
}

/// A labelled button on a step
#[derive(Debug, Clone, Deserialize)]
pub struct StepAction {
    pub label: String,
    pub action: ActionKind,
    #[serde(default, rename = "variant")]
    pub style: ActionStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    Auto,
}

/// Display configuration carried for presentation adapters
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    pub primary_color: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub border_radius: Option<String>,
    pub font_family: Option<String>,
    pub overlay_color: Option<String>,
    pub spotlight_padding: Option<u32>,
    pub mode: Option<ThemeMode>,
}

/// One unit of guided content
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub title: String,
    pub content: String,
    /// Selector of the element the step points at
    pub target: Option<String>,
    pub position: Option<Placement>,
    #[serde(default)]
    pub skippable: bool,
    #[serde(default)]
    pub dismissible: bool,
    #[serde(default)]
    pub actions: Vec<StepAction>,
    #[serde(skip)]
    pub on_enter: Option<Hook>,
    #[serde(skip)]
    pub on_exit: Option<Hook>,
}

impl StepDefinition {
    pub fn new(
        id: impl Into<String>,
        kind: StepKind,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            content: content.into(),
            target: None,
            position: None,
            skippable: false,
            dismissible: false,
            actions: Vec::new(),
            on_enter: None,
            on_exit: None,
        }
    }

    pub fn target(mut self, selector: impl Into<String>) -> Self {
        self.target = Some(selector.into());
        self
    }

    pub fn position(mut self, placement: Placement) -> Self {
        self.position = Some(placement);
        self
    }

    pub fn skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }

    pub fn dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    pub fn action(mut self, label: impl Into<String>, action: ActionKind, style: ActionStyle) -> Self {
        self.actions.push(StepAction {
            label: label.into(),
            action,
            style,
        });
        self
    }

    pub fn on_enter<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_enter = Some(Hook::new(f));
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_exit = Some(Hook::new(f));
        self
    }
}

/// A named, ordered sequence of steps
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub steps: Vec<StepDefinition>,
    pub variant: Option<Variant>,
    pub theme: Option<ThemeConfig>,
    #[serde(default)]
    pub dismiss_on_overlay_click: bool,
    #[serde(skip)]
    pub on_complete: Option<Hook>,
    #[serde(skip)]
    pub on_skip: Option<Hook>,
}

impl FlowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
            variant: None,
            theme: None,
            dismiss_on_overlay_click: false,
            on_complete: None,
            on_skip: None,
        }
    }

    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn theme(mut self, theme: ThemeConfig) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn dismiss_on_overlay_click(mut self, dismiss: bool) -> Self {
        self.dismiss_on_overlay_click = dismiss;
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_complete = Some(Hook::new(f));
        self
    }

    pub fn on_skip<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_skip = Some(Hook::new(f));
        self
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_at(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Position of `step_id` in the step sequence
    pub fn position_of(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn first_step_id(&self) -> Option<&str> {
        self.steps.first().map(|s| s.id.as_str())
    }

    pub fn is_last_index(&self, index: usize) -> bool {
        index + 1 >= self.steps.len()
    }

    /// Parse a JSON array of flow definitions
    pub fn parse_all(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a JSON array of flow definitions from disk
    pub fn load_all(path: &Path) -> Result<Vec<Self>, FlowError> {
        let load_err = |e: Box<dyn std::error::Error + Send + Sync>| FlowError::DefinitionsLoadFailed {
            path: path.display().to_string(),
            source: e,
        };

        let json = std::fs::read_to_string(path).map_err(|e| load_err(Box::new(e)))?;
        let flows = Self::parse_all(&json).map_err(|e| load_err(Box::new(e)))?;

        tracing::debug!("Loaded {} flow definitions from {}", flows.len(), path.display());
        Ok(flows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOUR_JSON: &str = r##"[
        {
            "id": "welcome-tour",
            "name": "Welcome Tour",
            "variant": "A",
            "dismissOnOverlayClick": true,
            "theme": { "primaryColor": "#3b82f6", "spotlightPadding": 12, "mode": "auto" },
            "steps": [
                { "id": "welcome", "type": "modal", "title": "Welcome", "content": "Hi", "skippable": true },
                {
                    "id": "create-project",
                    "type": "tooltip",
                    "title": "Create",
                    "content": "Click here",
                    "target": "#create-button",
                    "position": "bottom",
                    "actions": [
                        { "label": "Back", "action": "prev", "variant": "ghost" },
                        { "label": "Next", "action": "next" }
                    ]
                }
            ]
        }
    ]"##;

    #[test]
    fn test_parse_flow_json() {
        let flows = FlowDefinition::parse_all(TOUR_JSON).unwrap();
        assert_eq!(flows.len(), 1);

        let flow = &flows[0];
        assert_eq!(flow.id, "welcome-tour");
        assert_eq!(flow.variant, Some(Variant::A));
        assert!(flow.dismiss_on_overlay_click);
        assert!(flow.on_complete.is_none());
        assert_eq!(flow.theme.as_ref().and_then(|t| t.spotlight_padding), Some(12));
        assert_eq!(flow.theme.as_ref().and_then(|t| t.mode), Some(ThemeMode::Auto));

        let step = &flow.steps[1];
        assert_eq!(step.kind, StepKind::Tooltip);
        assert_eq!(step.position, Some(Placement::Bottom));
        assert_eq!(step.target.as_deref(), Some("#create-button"));
        assert!(!step.skippable);
        assert_eq!(step.actions.len(), 2);
        assert!(matches!(step.actions[0].action, ActionKind::Prev));
        assert_eq!(step.actions[0].style, ActionStyle::Ghost);
        assert_eq!(step.actions[1].style, ActionStyle::Primary);
    }

    #[test]
    fn test_custom_action_not_deserializable() {
        let json = r#"{ "label": "Go", "action": "custom" }"#;
        assert!(serde_json::from_str::<StepAction>(json).is_err());
    }

    #[test]
    fn test_builder_and_lookup() {
        let flow = FlowDefinition::new("tour", "Tour")
            .step(StepDefinition::new("a", StepKind::Modal, "A", "first"))
            .step(StepDefinition::new("b", StepKind::Spotlight, "B", "second").target(".grid"))
            .on_complete(|| Ok(()));

        assert_eq!(flow.step_count(), 2);
        assert_eq!(flow.first_step_id(), Some("a"));
        assert_eq!(flow.position_of("b"), Some(1));
        assert_eq!(flow.position_of("zzz"), None);
        assert!(!flow.is_last_index(0));
        assert!(flow.is_last_index(1));
        assert!(flow.on_complete.is_some());
    }

    #[test]
    fn test_hook_call() {
        let hook = Hook::new(|| anyhow::bail!("nope"));
        assert_eq!(hook.call().unwrap_err().to_string(), "nope");
        assert_eq!(format!("{:?}", hook), "Hook(..)");
    }

    #[test]
    fn test_load_all_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlowDefinition::load_all(&dir.path().join("flows.json")).unwrap_err();
        assert!(matches!(err, FlowError::DefinitionsLoadFailed { .. }));
    }
}
