//! Analytics events
//!
//! Events describe transitions that have happened. They are never mutated
//! after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock;
use crate::variant::Variant;

/// Transition an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Complete,
    Skip,
    Next,
    Prev,
    Dismiss,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Complete => "complete",
            EventKind::Skip => "skip",
            EventKind::Next => "next",
            EventKind::Prev => "prev",
            EventKind::Dismiss => "dismiss",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub flow_id: String,

    /// Step the event refers to; empty when the flow has no steps
    pub step_id: String,

    #[serde(rename = "event")]
    pub kind: EventKind,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl AnalyticsEvent {
    /// New event stamped with the current time
    pub fn new(flow_id: impl Into<String>, step_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            flow_id: flow_id.into(),
            step_id: step_id.into(),
            kind,
            timestamp: clock::now(),
            variant: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_variant(mut self, variant: Option<Variant>) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        let variant = self
            .variant
            .map(|v| format!(" [{}]", v))
            .unwrap_or_default();

        match self.kind {
            EventKind::Start => format!("Started {}{}", self.flow_id, variant),
            EventKind::Complete if self.step_id.is_empty() => {
                format!("Completed {}{}", self.flow_id, variant)
            }
            EventKind::Complete => format!("Completed {}/{}{}", self.flow_id, self.step_id, variant),
            EventKind::Skip => format!("Skipped {} at {}{}", self.flow_id, self.step_id, variant),
            EventKind::Dismiss => format!("Dismissed {} at {}{}", self.flow_id, self.step_id, variant),
            EventKind::Next => format!("Advanced {} to {}{}", self.flow_id, self.step_id, variant),
            EventKind::Prev => format!("Went back in {} to {}{}", self.flow_id, self.step_id, variant),
        }
    }
}
