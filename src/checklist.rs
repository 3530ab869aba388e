//! Checklist state
//!
//! A checklist is a list of tasks the user ticks off at their own pace,
//! independent of step sequencing.

use serde::{Deserialize, Serialize};

fn default_title() -> String {
    "Getting Started".to_string()
}

fn default_collapsible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl ChecklistItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            completed: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(default = "default_title")]
    pub title: String,
    pub items: Vec<ChecklistItem>,
    #[serde(default = "default_collapsible")]
    pub collapsible: bool,
    #[serde(default)]
    pub collapsed: bool,
}

impl Checklist {
    pub fn new(items: Vec<ChecklistItem>) -> Self {
        Self {
            title: default_title(),
            items,
            collapsible: true,
            collapsed: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Flip an item's completion, returning its new state
    pub fn toggle(&mut self, item_id: &str) -> Option<bool> {
        let item = self.items.iter_mut().find(|i| i.id == item_id)?;
        item.completed = !item.completed;
        Some(item.completed)
    }

    /// Collapse or expand; no-op unless collapsible
    pub fn toggle_collapsed(&mut self) -> bool {
        if self.collapsible {
            self.collapsed = !self.collapsed;
        }
        self.collapsed
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|i| i.completed).count()
    }

    /// Percentage of items completed; 0 for an empty list
    pub fn percent_complete(&self) -> f32 {
        if self.items.is_empty() {
            return 0.0;
        }
        self.completed_count() as f32 / self.items.len() as f32 * 100.0
    }

    pub fn is_done(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.completed)
    }
}
