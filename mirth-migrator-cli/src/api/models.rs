//! Mirth Migrator API models
//!
//! Request payloads and response bodies of the migrator web service. Field
//! names follow the wire format, which mixes camelCase keys with
//! human-readable ones ("Display name", "Number of members").

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::migration::types::{Component, ComponentType};

/// An environment (e.g. development, production) used to colour systems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// A configured Mirth instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub name: String,
    /// Server identifier (host name, domain or IP)
    pub server: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "environmentOrderId", default)]
    pub environment_order_id: i64,
}

/// Sort systems the way they are listed to the operator: by environment, then name
pub fn sort_systems(systems: &mut [SystemInfo]) {
    systems.sort_by(|a, b| {
        a.environment_order_id
            .cmp(&b.environment_order_id)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

/// Which kind of component table to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    #[serde(rename = "channels")]
    Channels,
    #[serde(rename = "codeTemplates")]
    CodeTemplates,
}

impl ComponentKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::CodeTemplates => "code templates",
        }
    }
}

/// Payload of `/getComponentMetaData`
#[derive(Debug, Clone, Serialize)]
pub struct ComponentMetaDataRequest {
    #[serde(rename = "componentType")]
    pub component_type: ComponentKind,
    pub system: String,
    pub refresh: bool,
}

/// Response of `/getComponentMetaData`: the rows of a component table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentMetaData {
    #[serde(default)]
    pub item: Vec<ComponentItem>,
    #[serde(rename = "Number of groups", default)]
    pub number_of_groups: Option<u64>,
    #[serde(rename = "Number of members", default)]
    pub number_of_members: Option<u64>,
    #[serde(rename = "Mirth version", default)]
    pub mirth_version: Option<String>,
}

/// A single table row as delivered by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentItem {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Display name", default)]
    pub display_name: String,
    #[serde(rename = "Function name", default)]
    pub function_name: Option<String>,
    #[serde(rename = "Type")]
    pub component_type: ComponentType,
    #[serde(rename = "Group", default)]
    pub group: bool,
    #[serde(default)]
    pub artificial: bool,
    #[serde(rename = "Number of members", default)]
    pub number_of_members: Option<u64>,
    #[serde(rename = "Display date", default)]
    pub display_date: Option<String>,
    #[serde(rename = "Version", default)]
    pub version: Option<Value>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Is disabled", default)]
    pub is_disabled: bool,
}

/// Identifies a component on one system
#[derive(Debug, Clone, Serialize)]
pub struct ComponentLocator {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub id: String,
}

/// Payload of `/getComponentDetails`
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDetailsRequest {
    pub system: String,
    pub component: ComponentLocator,
}

/// Attributes shown for a component, in display order
const DETAIL_KEYS: &[&str] = &[
    "Function Name",
    "Name",
    "Type",
    "Description",
    "Outbound Interfaces",
    "Inbound Interfaces",
    "Changes",
    "Parameters",
    "Return value",
    "Version",
    "Display date",
    "Id",
    "Number of channels",
    "Number of invalid references",
    "Number of references",
    "Referenced by channels",
    "Channel status",
    "Referenced Libraries",
    "Referenced by functions",
    "Uses functions",
];

/// Response of `/getComponentDetails`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentDetails {
    #[serde(rename = "Type", default)]
    pub component_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// A displayable attribute of a component
#[derive(Debug, Clone, PartialEq)]
pub struct DetailAttribute {
    pub key: String,
    pub values: Vec<String>,
    /// Attribute signals a problem (invalid references)
    pub alert: bool,
}

impl ComponentDetails {
    /// Non-empty attributes in display order, with display keys adjusted
    pub fn attributes(&self) -> Vec<DetailAttribute> {
        let is_code_template = self.component_type.as_deref() == Some("Code Template");
        let mut attributes = Vec::new();

        for key in DETAIL_KEYS {
            let value = if *key == "Type" {
                self.component_type.clone().map(Value::String)
            } else {
                self.attributes.get(*key).cloned()
            };

            let values = match value {
                Some(Value::Array(items)) => items.iter().map(display_value).collect(),
                Some(Value::Null) | None => continue,
                Some(Value::Bool(false)) => continue,
                Some(Value::String(s)) if s.is_empty() => continue,
                Some(Value::Number(n)) if n.as_f64() == Some(0.0) => continue,
                Some(other) => vec![display_value(&other)],
            };
            if values.is_empty() {
                continue;
            }

            let display_key = match *key {
                "Name" if is_code_template => "Template Name",
                "Display date" => "Last Change",
                other => other,
            };

            attributes.push(DetailAttribute {
                key: display_key.to_string(),
                values,
                alert: *key == "Number of invalid references",
            });
        }

        attributes
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Payload shared by the migration calls that operate on a component list
#[derive(Debug, Clone, Serialize)]
pub struct MigrationPayload {
    #[serde(rename = "sourceSystem")]
    pub source_system: String,
    #[serde(rename = "destinationSystem")]
    pub destination_system: String,
    pub component: Vec<Component>,
}

/// A conflict descriptor as returned by `/getConflictingComponents`
///
/// Unknown fields are kept because the descriptor is sent back verbatim to
/// `/getConflicts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "unknown_type")]
    pub component_type: ComponentType,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn unknown_type() -> ComponentType {
    ComponentType::Unknown
}

impl ConflictDescriptor {
    pub fn to_component(&self) -> Component {
        Component::new(self.id.clone(), self.name.clone(), self.component_type)
    }
}

/// Response of `/getConflictingComponents`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictList {
    #[serde(default)]
    pub component: Vec<ConflictDescriptor>,
}

/// Payload of `/getConflicts`
#[derive(Debug, Clone, Serialize)]
pub struct ConflictDetailRequest {
    #[serde(rename = "sourceSystem")]
    pub source_system: String,
    #[serde(rename = "destinationSystem")]
    pub destination_system: String,
    pub component: ConflictDescriptor,
}

/// One reason why a component cannot be migrated directly
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    #[serde(default)]
    pub conflict_message: Option<String>,
    #[serde(default)]
    pub source_mirth_version: Option<String>,
    #[serde(default)]
    pub destination_mirth_version: Option<String>,
}

/// Response of `/getConflicts`: full detail of the head conflict
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetail {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "unknown_type")]
    pub component_type: ComponentType,
    #[serde(default)]
    pub conflicts: Vec<ConflictEntry>,
    #[serde(default)]
    pub number_of_conflicts: Option<usize>,
    #[serde(default)]
    pub meta_data: Option<Value>,
    #[serde(default)]
    pub source_content: Option<String>,
    #[serde(default)]
    pub destination_content: Option<String>,
}

impl ConflictDetail {
    /// Conflict messages to show, limited to the announced number of conflicts
    pub fn messages(&self) -> Vec<&str> {
        let limit = self.number_of_conflicts.unwrap_or(self.conflicts.len());
        self.conflicts
            .iter()
            .take(limit)
            .filter_map(|c| c.conflict_message.as_deref())
            .collect()
    }
}

/// Attributes compared between the two versions of a component
const COMPARED_ATTRIBUTES: &[&str] = &[
    "name",
    "description",
    "parameters",
    "returnValue",
    "version",
    "lastModified",
];

/// One row of a source/destination metadata comparison
#[derive(Debug, Clone, PartialEq)]
pub struct MetaDataRow {
    pub attribute: String,
    pub source: String,
    pub destination: String,
}

impl MetaDataRow {
    pub fn differs(&self) -> bool {
        self.source != self.destination
    }
}

/// Build the metadata comparison table from a `metaData` object
pub fn metadata_rows(meta_data: Option<&Value>) -> Vec<MetaDataRow> {
    let Some(Value::Object(map)) = meta_data else {
        return Vec::new();
    };

    COMPARED_ATTRIBUTES
        .iter()
        .filter_map(|attribute| {
            let entry = map.get(*attribute)?;
            if entry.is_null() {
                return None;
            }
            let side = |key: &str| entry.get(key).map(display_value).unwrap_or_default();
            Some(MetaDataRow {
                attribute: attribute.to_string(),
                source: side("source"),
                destination: side("destination"),
            })
        })
        .collect()
}

/// Response of `/migrateComponents`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationResult {
    #[serde(default)]
    pub success: Vec<MigratedComponent>,
    #[serde(default)]
    pub failure: Vec<MigratedComponent>,
}

/// Outcome entry for one migrated component
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedComponent {
    pub name: String,
    #[serde(rename = "type", default = "unknown_type")]
    pub component_type: ComponentType,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error_code: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Functions contained in a code template
    #[serde(default)]
    pub function: Vec<String>,
}

/// Component reference of `/compareComponent`
#[derive(Debug, Clone, Serialize)]
pub struct CompareTarget {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(rename = "targetId", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

/// Payload of `/compareComponent`
#[derive(Debug, Clone, Serialize)]
pub struct CompareRequest {
    #[serde(rename = "sourceSystem")]
    pub source_system: String,
    #[serde(rename = "destinationSystem")]
    pub destination_system: String,
    pub component: CompareTarget,
}

/// Response of `/compareComponent`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    #[serde(default)]
    pub source_content: Option<String>,
    #[serde(default)]
    pub destination_content: Option<String>,
    #[serde(default)]
    pub meta_data: Option<Value>,
}

/// Server-side configuration of the migrator (`/getConfiguration`, `/setConfiguration`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    #[serde(default)]
    pub environment: Vec<EnvironmentConfig>,
    #[serde(default)]
    pub system: Vec<SystemConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miscellaneous: Option<MiscConfig>,
    #[serde(rename = "excludeFromFunctionDetection", default)]
    pub exclude_from_function_detection: Vec<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiscConfig {
    /// 0 disables session expiry
    #[serde(default)]
    pub session_life_span_in_minutes: Value,
    #[serde(default)]
    pub use_extended_channel_state_control_scheme: bool,
    #[serde(default)]
    pub channel_status_update_interval_in_seconds: Value,
}
