//! Flow definitions, progress records and the controller that sequences them
//!
//! ## Architecture
//!
//! ```text
//! FlowController
//!   ├── FlowDefinition (ordered StepDefinitions, hooks, theme)
//!   ├── ProgressRecord (current step, completed steps, outcome)
//!   └── Navigation (start, next, prev, skip, complete, go_to_step, reset)
//! ```
//!
//! ## States
//!
//! `Idle` → `Running(step_index)` → `Completed` | `Skipped` → `Idle`

pub mod controller;
pub mod definition;
pub mod progress;
pub mod view;

pub use controller::{FlowController, FlowState, Transition};
pub use definition::{
    ActionHandler, ActionKind, ActionStyle, FlowDefinition, Hook, Placement, StepAction, StepDefinition, StepKind,
    ThemeConfig, ThemeMode,
};
pub use progress::{ProgressRecord, ProgressUpdate};
pub use view::StepView;
