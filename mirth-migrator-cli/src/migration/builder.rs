//! Builds the set of components to migrate from the highlighted rows
//!
//! Groups are never migrated as a unit. A highlighted group stands for the
//! leaf rows directly following it in the table.

use std::collections::HashMap;

use log::debug;

use super::types::{Component, ComponentType, Row};

/// Insertion-ordered set of leaf components, keyed by id
///
/// The first insertion of an id wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    order: Vec<String>,
    components: HashMap<String, Component>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component unless its id is already present
    pub fn insert(&mut self, component: Component) -> bool {
        if self.components.contains_key(&component.id) {
            return false;
        }
        self.order.push(component.id.clone());
        self.components.insert(component.id.clone(), component);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Component> {
        let component = self.components.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(component)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.components.clear();
    }

    pub fn first(&self) -> Option<&Component> {
        self.order.first().and_then(|id| self.components.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.order.iter().filter_map(|id| self.components.get(id))
    }

    /// Components in insertion order, as sent to the server
    pub fn to_vec(&self) -> Vec<Component> {
        self.iter().cloned().collect()
    }

    /// Merge components returned by the server, keeping existing entries
    pub fn merge(&mut self, components: impl IntoIterator<Item = Component>) -> usize {
        components
            .into_iter()
            .filter(|component| self.insert(component.clone()))
            .count()
    }
}

/// Collect the leaf components behind the highlighted rows, in table order
pub fn build_selection_set(rows: &[Row], highlighted: &[usize]) -> SelectionSet {
    let mut highlighted = highlighted.to_vec();
    highlighted.sort_unstable();
    highlighted.dedup();

    let mut set = SelectionSet::new();

    for index in highlighted {
        let Some(row) = rows.get(index) else {
            continue;
        };

        if row.is_leaf() {
            set.insert(row.to_component());
            continue;
        }
        if !row.is_group() {
            debug!("Ignoring highlighted {} row '{}'", row.component_type.label(), row.label);
            continue;
        }

        let members = rows[index + 1..]
            .iter()
            .take_while(|member| member.is_leaf());
        let mut added = 0;
        for member in members {
            if set.insert(member.to_component()) {
                added += 1;
            }
        }
        debug!("Group '{}' contributed {} component(s)", row.label, added);
    }

    set
}

/// Whether the referenced code templates have to be collected before migrating
pub fn needs_referenced_templates(set: &SelectionSet, opted_in: bool) -> bool {
    opted_in
        && set
            .first()
            .is_some_and(|component| component.component_type == ComponentType::Channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<Row> {
        vec![
            Row::new("g1", "Inbound", ComponentType::ChannelGroup),
            Row::new("c1", "CH1", ComponentType::Channel),
            Row::new("c2", "CH2", ComponentType::Channel),
            Row::new("g2", "Empty", ComponentType::ChannelGroup),
            Row::new("g3", "Outbound", ComponentType::ChannelGroup),
            Row::new("c3", "CH3", ComponentType::Channel),
        ]
    }

    fn ids(set: &SelectionSet) -> Vec<&str> {
        set.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_group_expands_to_following_leaves() {
        let set = build_selection_set(&table(), &[0]);
        assert_eq!(ids(&set), vec!["c1", "c2"]);
    }

    #[test]
    fn test_group_and_member_highlighted_yield_member_once() {
        let set = build_selection_set(&table(), &[2, 0]);
        assert_eq!(ids(&set), vec!["c1", "c2"]);
    }

    #[test]
    fn test_empty_group_contributes_nothing() {
        let set = build_selection_set(&table(), &[3]);
        assert!(set.is_empty());

        let last = build_selection_set(&table(), &[4]);
        assert_eq!(ids(&last), vec!["c3"]);
    }

    #[test]
    fn test_rows_that_are_not_groups_contribute_nothing() {
        let rows = vec![
            Row::new("x1", "Mystery", ComponentType::Unknown),
            Row::new("c1", "CH1", ComponentType::Channel),
            Row::new("c2", "CH2", ComponentType::Channel),
            Row::new("tag", "Nightly", ComponentType::ChannelTag),
            Row::new("c3", "CH3", ComponentType::Channel),
        ];

        assert!(build_selection_set(&rows, &[0]).is_empty());
        assert!(build_selection_set(&rows, &[3]).is_empty());
        assert!(!rows[0].is_group());

        let set = build_selection_set(&rows, &[0, 4]);
        assert_eq!(ids(&set), vec!["c3"]);
    }

    #[test]
    fn test_function_rows_collapse_to_one_template() {
        let rows = vec![
            Row::new("lib", "Helpers", ComponentType::CodeTemplateLibrary),
            Row::new("t1_1", "formatDate", ComponentType::CodeTemplate),
            Row::new("t1_2", "parseDate", ComponentType::CodeTemplate),
            Row::new("t2", "log", ComponentType::CodeTemplate),
        ];

        let set = build_selection_set(&rows, &[0, 2]);
        assert_eq!(ids(&set), vec!["t1", "t2"]);
        assert_eq!(set.first().map(|c| c.name.as_str()), Some("formatDate"));
    }

    #[test]
    fn test_merge_keeps_first_insertion() {
        let mut set = build_selection_set(&table(), &[1]);
        let added = set.merge(vec![
            Component::new("c1", "renamed", ComponentType::Channel),
            Component::new("t9", "Helpers", ComponentType::CodeTemplate),
        ]);

        assert_eq!(added, 1);
        assert_eq!(ids(&set), vec!["c1", "t9"]);
        assert_eq!(set.first().map(|c| c.name.as_str()), Some("CH1"));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut set = build_selection_set(&table(), &[0, 5]);
        assert!(set.remove("c2").is_some());
        assert!(set.remove("c2").is_none());
        assert_eq!(ids(&set), vec!["c1", "c3"]);
    }

    #[test]
    fn test_referenced_templates_only_for_channels() {
        let channels = build_selection_set(&table(), &[1]);
        assert!(needs_referenced_templates(&channels, true));
        assert!(!needs_referenced_templates(&channels, false));

        let mut templates = SelectionSet::new();
        templates.insert(Component::new("t1", "Helpers", ComponentType::CodeTemplate));
        assert!(!needs_referenced_templates(&templates, true));
        assert!(!needs_referenced_templates(&SelectionSet::new(), true));
    }
}
