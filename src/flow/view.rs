//! Read-only snapshot handed to presentation adapters

use std::sync::Arc;

use super::definition::{FlowDefinition, StepDefinition};
use super::progress::ProgressRecord;

/// What an adapter needs to render the active step
#[derive(Debug, Clone)]
pub struct StepView {
    pub definition: Arc<FlowDefinition>,
    pub step_index: usize,
    pub progress: Option<ProgressRecord>,
}

impl StepView {
    pub fn step(&self) -> Option<&StepDefinition> {
        self.definition.step_at(self.step_index)
    }

    pub fn is_first(&self) -> bool {
        self.step_index == 0
    }

    pub fn is_last(&self) -> bool {
        self.definition.is_last_index(self.step_index)
    }

    /// 1-indexed step number
    pub fn number(&self) -> usize {
        self.step_index + 1
    }

    pub fn total(&self) -> usize {
        self.definition.step_count()
    }

    pub fn can_go_back(&self) -> bool {
        !self.is_first()
    }

    pub fn can_skip(&self) -> bool {
        self.step().map(|s| s.skippable).unwrap_or(false)
    }

    /// Overlay clicks should dismiss the flow
    pub fn dismiss_on_overlay(&self) -> bool {
        self.definition.dismiss_on_overlay_click
    }

    /// Share of steps completed (0.0-1.0)
    pub fn fraction_complete(&self) -> f32 {
        self.progress
            .as_ref()
            .map(|p| p.fraction_complete(self.total()))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::StepKind;

    fn view(step_index: usize) -> StepView {
        let definition = FlowDefinition::new("tour", "Tour")
            .step(StepDefinition::new("a", StepKind::Modal, "A", "").skippable(true))
            .step(StepDefinition::new("b", StepKind::Tooltip, "B", ""));
        StepView {
            definition: Arc::new(definition),
            step_index,
            progress: None,
        }
    }

    #[test]
    fn test_first_step() {
        let v = view(0);
        assert!(v.is_first());
        assert!(!v.is_last());
        assert!(!v.can_go_back());
        assert!(v.can_skip());
        assert_eq!(v.number(), 1);
        assert_eq!(v.total(), 2);
        assert_eq!(v.fraction_complete(), 0.0);
    }

    #[test]
    fn test_last_step() {
        let v = view(1);
        assert!(v.is_last());
        assert!(v.can_go_back());
        assert!(!v.can_skip());
        assert_eq!(v.step().map(|s| s.title.as_str()), Some("B"));
    }
}
