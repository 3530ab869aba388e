//! Per-flow progress records
//!
//! Tracks how far a user has advanced through a flow. Records are the
//! engine's persisted state; field names on the wire are camelCase and
//! timestamps are epoch milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::variant::Variant;

/// Progress through one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub flow_id: String,

    pub current_step_index: usize,

    /// Ids of steps the user has moved past
    pub completed_steps: BTreeSet<String>,

    pub skipped: bool,

    pub completed: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
}

impl ProgressRecord {
    /// Fresh record at the first step
    pub fn new(flow_id: impl Into<String>, variant: Option<Variant>, started_at: DateTime<Utc>) -> Self {
        Self {
            flow_id: flow_id.into(),
            current_step_index: 0,
            completed_steps: BTreeSet::new(),
            skipped: false,
            completed: false,
            started_at,
            completed_at: None,
            variant,
        }
    }

    pub fn is_step_completed(&self, step_id: &str) -> bool {
        self.completed_steps.contains(step_id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_steps.len()
    }

    /// Reached a terminal outcome (completed or skipped)
    pub fn is_finished(&self) -> bool {
        self.completed || self.skipped
    }

    /// Completion progress (0.0-1.0) for a flow with `step_count` steps
    pub fn fraction_complete(&self, step_count: usize) -> f32 {
        if self.completed {
            return 1.0;
        }
        if step_count == 0 {
            return 0.0;
        }

        (self.completed_count() as f32 / step_count as f32).min(1.0)
    }

    /// Merge the fields set in `update`
    pub fn apply(&mut self, update: ProgressUpdate) {
        let ProgressUpdate {
            current_step_index,
            completed_steps,
            skipped,
            completed,
            started_at,
            completed_at,
            variant,
        } = update;

        if let Some(index) = current_step_index {
            self.current_step_index = index;
        }
        if let Some(steps) = completed_steps {
            self.completed_steps = steps;
        }
        if let Some(skipped) = skipped {
            self.skipped = skipped;
        }
        if let Some(completed) = completed {
            self.completed = completed;
        }
        if let Some(started_at) = started_at {
            self.started_at = started_at;
        }
        if let Some(completed_at) = completed_at {
            self.completed_at = completed_at;
        }
        if let Some(variant) = variant {
            self.variant = variant;
        }
    }
}

/// Partial update to a progress record. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub current_step_index: Option<usize>,
    pub completed_steps: Option<BTreeSet<String>>,
    pub skipped: Option<bool>,
    pub completed: Option<bool>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub variant: Option<Option<Variant>>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_index(mut self, index: usize) -> Self {
        self.current_step_index = Some(index);
        self
    }

    pub fn completed_steps(mut self, steps: BTreeSet<String>) -> Self {
        self.completed_steps = Some(steps);
        self
    }

    pub fn skipped(mut self, skipped: bool) -> Self {
        self.skipped = Some(skipped);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(Some(at));
        self
    }

    pub fn clear_completed_at(mut self) -> Self {
        self.completed_at = Some(None);
        self
    }

    pub fn variant(mut self, variant: Option<Variant>) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
