//! Client-side migration workflow
//!
//! Selection of components in the two tables, building the set to migrate,
//! interactive conflict resolution and the final report.

pub mod builder;
pub mod conflicts;
pub mod report;
pub mod selection;
pub mod types;
pub mod workflow;

pub use builder::build_selection_set;
pub use selection::{SelectMode, SelectionModel};
pub use types::{Component, ComponentType, Row, TableSide};
pub use workflow::{Command, MigrationRequest, MigrationWorkflow, Msg, Resolution, WorkflowState};
