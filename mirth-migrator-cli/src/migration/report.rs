//! Migration report
//!
//! Lists every migrated, failed and skipped component, grouped by type in a
//! fixed order and sorted by name within each group.

use chrono::{DateTime, Local};
use colored::*;

use super::types::{Component, ComponentStatus, ComponentType};
use crate::api::models::MigratedComponent;

/// Component types listed in the report, in display order
pub const REPORT_ORDER: [ComponentType; 5] = [
    ComponentType::CodeTemplate,
    ComponentType::CodeTemplateLibrary,
    ComponentType::Channel,
    ComponentType::ChannelGroup,
    ComponentType::ChannelTag,
];

#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub name: String,
    pub component_type: ComponentType,
    pub status: ComponentStatus,
    pub id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Functions of a code template, sorted
    pub functions: Vec<String>,
}

impl ReportEntry {
    fn migrated(component: &MigratedComponent, status: ComponentStatus) -> Self {
        let mut functions = component.function.clone();
        functions.sort();
        Self {
            name: component.name.clone(),
            component_type: component.component_type,
            status,
            id: component.id.clone(),
            error_code: component.error_code.as_ref().map(|code| match code {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            error_message: component.error_message.clone(),
            functions,
        }
    }

    fn skipped(component: &Component) -> Self {
        Self {
            name: component.name.clone(),
            component_type: component.component_type,
            status: ComponentStatus::Skipped,
            id: Some(component.id.clone()),
            error_code: None,
            error_message: None,
            functions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub component_type: ComponentType,
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub created: DateTime<Local>,
    pub source_system: String,
    pub destination_system: String,
    /// Non-empty sections in display order
    pub sections: Vec<ReportSection>,
}

/// Build the report from the server's outcome and the components skipped while resolving conflicts
pub fn build_report(
    success: &[MigratedComponent],
    failure: &[MigratedComponent],
    skipped: &[Component],
) -> MigrationReport {
    let entries: Vec<ReportEntry> = success
        .iter()
        .map(|c| ReportEntry::migrated(c, ComponentStatus::Success))
        .chain(
            failure
                .iter()
                .map(|c| ReportEntry::migrated(c, ComponentStatus::Failure)),
        )
        .chain(skipped.iter().map(ReportEntry::skipped))
        .collect();

    let sections = REPORT_ORDER
        .iter()
        .filter_map(|component_type| {
            let mut section: Vec<ReportEntry> = entries
                .iter()
                .filter(|entry| entry.component_type == *component_type)
                .cloned()
                .collect();
            if section.is_empty() {
                return None;
            }
            section.sort_by(|a, b| a.name.cmp(&b.name));
            Some(ReportSection {
                component_type: *component_type,
                entries: section,
            })
        })
        .collect();

    MigrationReport {
        created: Local::now(),
        source_system: String::new(),
        destination_system: String::new(),
        sections,
    }
}

impl MigrationReport {
    pub fn with_systems(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.source_system = source.into();
        self.destination_system = destination.into();
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.sections.iter().flat_map(|section| section.entries.iter())
    }

    pub fn count(&self, status: ComponentStatus) -> usize {
        self.entries().filter(|entry| entry.status == status).count()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", "Migration Report".bold().underline()));
        if !self.source_system.is_empty() {
            out.push_str(&format!(
                "{} → {}  ({})\n",
                self.source_system.cyan(),
                self.destination_system.cyan(),
                self.created.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        out.push('\n');

        let width = self
            .sections
            .iter()
            .map(|section| section.component_type.label().len())
            .max()
            .unwrap_or(0);

        for section in &self.sections {
            for entry in &section.entries {
                let status = match entry.status {
                    ComponentStatus::Success => entry.status.label().green(),
                    ComponentStatus::Failure => entry.status.label().red(),
                    ComponentStatus::Skipped => entry.status.label().yellow(),
                    ComponentStatus::Pending => entry.status.label().normal(),
                };
                out.push_str(&format!(
                    "{:<width$}  {}: {}",
                    section.component_type.label(),
                    entry.name.bold(),
                    status,
                    width = width
                ));
                if let Some(message) = &entry.error_message {
                    out.push_str(&format!(" ({})", message.dimmed()));
                }
                out.push('\n');

                for function in &entry.functions {
                    out.push_str(&format!(
                        "{:>width$}  {}\n",
                        "contains function".dimmed(),
                        function,
                        width = width
                    ));
                }
            }
        }

        out.push_str(&format!(
            "\n{} succeeded, {} failed, {} skipped\n",
            self.count(ComponentStatus::Success),
            self.count(ComponentStatus::Failure),
            self.count(ComponentStatus::Skipped)
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated(name: &str, component_type: ComponentType) -> MigratedComponent {
        MigratedComponent {
            name: name.to_string(),
            component_type,
            id: None,
            error_code: None,
            error_message: None,
            function: Vec::new(),
        }
    }

    fn summary(report: &MigrationReport) -> Vec<(ComponentType, String, ComponentStatus)> {
        report
            .entries()
            .map(|e| (e.component_type, e.name.clone(), e.status))
            .collect()
    }

    #[test]
    fn test_entries_grouped_by_type_and_status() {
        let report = build_report(
            &[migrated("A", ComponentType::Channel)],
            &[migrated("B", ComponentType::CodeTemplate)],
            &[Component::new("c", "C", ComponentType::Channel)],
        );

        assert_eq!(
            summary(&report),
            vec![
                (ComponentType::CodeTemplate, "B".to_string(), ComponentStatus::Failure),
                (ComponentType::Channel, "A".to_string(), ComponentStatus::Success),
                (ComponentType::Channel, "C".to_string(), ComponentStatus::Skipped),
            ]
        );
    }

    #[test]
    fn test_sections_follow_fixed_order_and_sort_by_name() {
        let report = build_report(
            &[
                migrated("tag", ComponentType::ChannelTag),
                migrated("zeta", ComponentType::Channel),
                migrated("Group", ComponentType::ChannelGroup),
                migrated("alpha", ComponentType::Channel),
                migrated("Lib", ComponentType::CodeTemplateLibrary),
                migrated("mystery", ComponentType::Unknown),
            ],
            &[],
            &[],
        );

        let types: Vec<_> = report.sections.iter().map(|s| s.component_type).collect();
        assert_eq!(
            types,
            vec![
                ComponentType::CodeTemplateLibrary,
                ComponentType::Channel,
                ComponentType::ChannelGroup,
                ComponentType::ChannelTag,
            ]
        );
        let channels: Vec<_> = report.sections[1].entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(channels, vec!["alpha", "zeta"]);
        assert_eq!(report.entries().count(), 5);
    }

    #[test]
    fn test_functions_sorted_and_errors_kept() {
        let mut template = migrated("Helpers", ComponentType::CodeTemplate);
        template.function = vec!["parse".to_string(), "format".to_string()];
        let mut broken = migrated("Broken", ComponentType::Channel);
        broken.error_code = Some(serde_json::json!(17));
        broken.error_message = Some("Duplicate port".to_string());

        let report = build_report(&[template], &[broken], &[]);
        let helpers = report.entries().find(|e| e.name == "Helpers").unwrap();
        assert_eq!(helpers.functions, vec!["format", "parse"]);

        let failed = report.entries().find(|e| e.name == "Broken").unwrap();
        assert_eq!(failed.error_code.as_deref(), Some("17"));

        let rendered = report.render();
        assert!(rendered.contains("contains function"));
        assert!(rendered.contains("Duplicate port"));
        assert!(rendered.contains("1 succeeded, 1 failed, 0 skipped"));
    }
}
