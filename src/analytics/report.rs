//! Aggregate queries over the analytics log

use serde::{Deserialize, Serialize};

use super::event::{AnalyticsEvent, EventKind};
use crate::variant::Variant;

fn count(events: &[AnalyticsEvent], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

/// `complete` events per `start` event, as a percentage.
///
/// Raw event counts: repeated starts and per-step completions all count.
/// Returns 0 when nothing has been started.
pub fn completion_rate(events: &[AnalyticsEvent]) -> f64 {
    let starts = count(events, EventKind::Start);
    if starts == 0 {
        return 0.0;
    }

    count(events, EventKind::Complete) as f64 / starts as f64 * 100.0
}

/// `complete` events bucketed by variant
pub fn ab_test_results(events: &[AnalyticsEvent]) -> AbTestResults {
    events
        .iter()
        .filter(|e| e.kind == EventKind::Complete)
        .fold(AbTestResults::default(), |mut acc, e| {
            match e.variant {
                Some(Variant::A) => acc.a += 1,
                Some(Variant::B) => acc.b += 1,
                None => {}
            }
            acc
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbTestResults {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
}

impl AbTestResults {
    pub fn get(&self, variant: Variant) -> usize {
        match variant {
            Variant::A => self.a,
            Variant::B => self.b,
        }
    }

    /// Variant with strictly more completions, if any
    pub fn winning_variant(&self) -> Option<Variant> {
        match self.a.cmp(&self.b) {
            std::cmp::Ordering::Greater => Some(Variant::A),
            std::cmp::Ordering::Less => Some(Variant::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Event counts for one flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSummary {
    pub flow_id: String,
    pub starts: usize,
    pub completions: usize,
    pub skips: usize,
    pub dismissals: usize,
    pub nexts: usize,
    pub prevs: usize,
    pub completion_rate: f64,
    pub ab: AbTestResults,
}

impl FlowSummary {
    /// Summarize `events`, which must already be filtered to `flow_id`
    pub fn from_events(flow_id: impl Into<String>, events: &[AnalyticsEvent]) -> Self {
        Self {
            flow_id: flow_id.into(),
            starts: count(events, EventKind::Start),
            completions: count(events, EventKind::Complete),
            skips: count(events, EventKind::Skip),
            dismissals: count(events, EventKind::Dismiss),
            nexts: count(events, EventKind::Next),
            prevs: count(events, EventKind::Prev),
            completion_rate: completion_rate(events),
            ab: ab_test_results(events),
        }
    }
}
