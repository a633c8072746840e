//! Core data types for the migration workflow
//!
//! These types describe the migratable components of a Mirth instance and
//! the rows of the two component tables the operator selects from.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::models::ComponentItem;

/// Kind of a Mirth component as named by the migrator API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentType {
    Channel,
    CodeTemplate,
    ChannelGroup,
    CodeTemplateLibrary,
    /// Only ever reported back by a migration, never selected
    ChannelTag,
    #[serde(other)]
    Unknown,
}

impl ComponentType {
    /// Leaf components are migrated directly
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Channel | Self::CodeTemplate)
    }

    /// Groups are containers whose members are migrated instead of the group itself
    pub fn is_group(&self) -> bool {
        matches!(self, Self::ChannelGroup | Self::CodeTemplateLibrary)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::CodeTemplate => "code template",
            Self::ChannelGroup => "channel group",
            Self::CodeTemplateLibrary => "code template library",
            Self::ChannelTag => "channel tag",
            Self::Unknown => "unknown",
        }
    }
}

/// Migration status of a component, assigned during or after execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Pending,
    Success,
    Failure,
    Skipped,
}

impl ComponentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// A migratable unit as sent to the migrator API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComponentStatus>,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>, component_type: ComponentType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            component_type,
            status: None,
        }
    }

    /// Copy of this component tagged as skipped
    pub fn skipped(&self) -> Self {
        Self {
            status: Some(ComponentStatus::Skipped),
            ..self.clone()
        }
    }
}

/// One of the two side-by-side component tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableSide {
    /// Left table
    Source,
    /// Right table
    Destination,
}

impl TableSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Source => Self::Destination,
            Self::Destination => Self::Source,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Source => "left",
            Self::Destination => "right",
        }
    }
}

// Several rows may represent the same component (one row per code template function)
static ROW_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_\d+$").expect("valid regex"));

/// A row of a component table
///
/// Group membership is positional: the members of a group are the leaf rows
/// directly following it, up to the next group row or the end of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row identifier as delivered by the server (may carry a `_N` suffix)
    pub row_id: String,
    /// Name shown in the table (function name for code template function rows)
    pub label: String,
    /// Name of the component the row represents
    pub component_name: String,
    pub component_type: ComponentType,
    /// Unassigned-members pseudo group
    pub artificial: bool,
    pub member_count: Option<u64>,
    pub display_date: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub disabled: bool,
}

impl Row {
    /// Create a leaf or group row with only the essentials filled in
    pub fn new(row_id: impl Into<String>, label: impl Into<String>, component_type: ComponentType) -> Self {
        let label = label.into();
        Self {
            row_id: row_id.into(),
            component_name: label.clone(),
            label,
            component_type,
            artificial: false,
            member_count: None,
            display_date: None,
            version: None,
            description: None,
            disabled: false,
        }
    }

    /// Identifier of the component this row represents
    pub fn component_id(&self) -> &str {
        match ROW_SUFFIX.find(&self.row_id) {
            Some(suffix) => &self.row_id[..suffix.start()],
            None => &self.row_id,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.component_type.is_leaf()
    }

    pub fn is_group(&self) -> bool {
        self.component_type.is_group()
    }

    pub fn to_component(&self) -> Component {
        Component::new(self.component_id(), self.label.clone(), self.component_type)
    }
}

impl From<ComponentItem> for Row {
    fn from(item: ComponentItem) -> Self {
        let label = item
            .function_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| item.display_name.clone());
        Self {
            row_id: item.id,
            label: label.trim().to_string(),
            component_name: item.display_name.trim().to_string(),
            component_type: item.component_type,
            artificial: item.artificial,
            member_count: item.number_of_members,
            display_date: item.display_date,
            version: item.version.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            description: item.description,
            disabled: item.is_disabled,
        }
    }
}
