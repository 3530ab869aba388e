//! Flow progression engine for product onboarding tours.
//!
//! ## Architecture
//!
//! ```text
//! FlowController (active flow cursor, hooks, transitions)
//!   └── Arc<FlowStore>
//!         ├── flow definitions (registered once, last write wins)
//!         ├── progress records  ──┐
//!         ├── analytics log     ──┴── Storage (file | memory | none)
//!         └── AnalyticsBus (subscribers get every tracked event)
//! ```
//!
//! Presentation adapters read [`FlowController::current_view`] and call back
//! into the controller on user interaction. They hold no state of their own.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use onboard_flow::{EngineConfig, FlowController, FlowDefinition, FlowStore, StepDefinition, StepKind};
//!
//! let config = EngineConfig::in_memory();
//! let store = Arc::new(FlowStore::open(&config)?);
//! store.register_flow(
//!     FlowDefinition::new("tour", "Product tour")
//!         .step(StepDefinition::new("welcome", StepKind::Modal, "Welcome", "Let's look around"))
//!         .step(StepDefinition::new("create", StepKind::Tooltip, "Create", "Start here").target("#create")),
//! );
//!
//! let mut controller = FlowController::new(Arc::clone(&store), &config);
//! controller.start("tour", None);
//! controller.next()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analytics;
pub mod checklist;
pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod store;
pub mod variant;

pub use analytics::{AbTestResults, AnalyticsBus, AnalyticsEvent, EventKind, FlowSummary, MetadataValue, SubscriberId};
pub use checklist::{Checklist, ChecklistItem};
pub use config::{EngineConfig, HookPolicy, StorageBackend};
pub use error::{AppResult, ConfigError, FlowError, HookKind, StorageError};
pub use flow::{
    ActionHandler, ActionKind, ActionStyle, FlowController, FlowDefinition, FlowState, Hook, Placement,
    ProgressRecord, ProgressUpdate, StepAction, StepDefinition, StepKind, StepView, ThemeConfig, ThemeMode,
    Transition,
};
pub use store::{FileStorage, FlowStore, MemoryStorage, Storage};
pub use variant::Variant;
