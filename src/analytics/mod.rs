//! Analytics event log types, reporting and subscription
//!
//! Events are append-only notifications of flow transitions. The store keeps
//! the log; [`AnalyticsBus`] lets a host forward each event as it is tracked.

pub mod bus;
pub mod event;
pub mod report;

pub use bus::{AnalyticsBus, SubscriberId};
pub use event::{AnalyticsEvent, EventKind, MetadataValue};
pub use report::{ab_test_results, completion_rate, AbTestResults, FlowSummary};
