//! Selection model of the two component tables
//!
//! Rows are highlighted in one table at a time. The highlighted table is the
//! migration source, the other one the destination. When a single leaf row is
//! highlighted, the first row with the same name in the opposite table is
//! marked as its correspondence, which is the default compare partner.

use std::collections::BTreeSet;

use log::{debug, warn};

use super::types::{Row, TableSide};

/// How a click on a row changes the highlights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Plain click
    Single,
    /// Ctrl/Cmd click
    Toggle,
    /// Shift click
    Extend,
}

/// One of the two component tables
#[derive(Debug, Clone, Default)]
pub struct ComponentTable {
    /// System the rows were loaded from, `None` if the table is empty
    pub system: Option<String>,
    pub mirth_version: Option<String>,
    pub rows: Vec<Row>,
    highlighted: BTreeSet<usize>,
    anchor: Option<usize>,
}

impl ComponentTable {
    pub fn is_loaded(&self) -> bool {
        self.system.is_some()
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        self.highlighted.contains(&index)
    }

    /// Highlighted row indices in table order
    pub fn highlighted(&self) -> Vec<usize> {
        self.highlighted.iter().copied().collect()
    }

    pub fn highlighted_rows(&self) -> Vec<&Row> {
        self.highlighted.iter().filter_map(|&i| self.rows.get(i)).collect()
    }

    pub fn has_highlights(&self) -> bool {
        !self.highlighted.is_empty()
    }

    /// Index of the first row with the given display name
    pub fn position(&self, label: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.label == label)
    }

    fn clear_highlights(&mut self) {
        self.highlighted.clear();
        self.anchor = None;
    }

    fn click(&mut self, index: usize, mode: SelectMode) {
        match (mode, self.anchor) {
            (SelectMode::Single, _) => {
                let was_sole = self.highlighted.len() == 1 && self.highlighted.contains(&index);
                self.highlighted.clear();
                if !was_sole {
                    self.highlighted.insert(index);
                }
                self.anchor = Some(index);
            }
            (SelectMode::Extend, Some(anchor)) => {
                let (from, to) = if anchor <= index { (anchor, index) } else { (index, anchor) };
                for row in from..=to {
                    self.highlighted.insert(row);
                }
            }
            (SelectMode::Toggle, _) | (SelectMode::Extend, None) => {
                if !self.highlighted.remove(&index) {
                    self.highlighted.insert(index);
                }
                self.anchor = Some(index);
            }
        }
    }
}

/// Row in one table that corresponds to the single highlighted row of the other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correspondence {
    pub side: TableSide,
    pub index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    source: ComponentTable,
    destination: ComponentTable,
    correspondence: Option<Correspondence>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, side: TableSide) -> &ComponentTable {
        match side {
            TableSide::Source => &self.source,
            TableSide::Destination => &self.destination,
        }
    }

    fn table_mut(&mut self, side: TableSide) -> &mut ComponentTable {
        match side {
            TableSide::Source => &mut self.source,
            TableSide::Destination => &mut self.destination,
        }
    }

    /// Replace the rows of a table; its highlights are dropped
    pub fn load(&mut self, side: TableSide, system: impl Into<String>, mirth_version: Option<String>, rows: Vec<Row>) {
        let table = self.table_mut(side);
        table.system = Some(system.into());
        table.mirth_version = mirth_version;
        table.rows = rows;
        table.clear_highlights();
        self.update_correspondence();
    }

    pub fn unload(&mut self, side: TableSide) {
        *self.table_mut(side) = ComponentTable::default();
        self.update_correspondence();
    }

    pub fn clear_highlights(&mut self) {
        self.source.clear_highlights();
        self.destination.clear_highlights();
        self.correspondence = None;
    }

    /// Apply a click on a row
    ///
    /// Returns the correspondence, i.e. the row of the opposite table to
    /// scroll into view, if there is one.
    pub fn toggle(&mut self, side: TableSide, index: usize, mode: SelectMode) -> Option<Correspondence> {
        if index >= self.table(side).rows.len() {
            warn!("Ignoring click on row {} of the {} table", index, side.label());
            return self.correspondence;
        }

        self.table_mut(side.opposite()).clear_highlights();
        self.table_mut(side).click(index, mode);
        self.update_correspondence();

        debug!(
            "{} table highlights: {:?}",
            side.label(),
            self.table(side).highlighted()
        );
        self.correspondence
    }

    pub fn correspondence(&self) -> Option<Correspondence> {
        self.correspondence
    }

    fn update_correspondence(&mut self) {
        self.correspondence = self.single_leaf().and_then(|(side, row)| {
            let opposite = side.opposite();
            self.table(opposite)
                .position(&row.label)
                .map(|index| Correspondence { side: opposite, index })
        });
    }

    /// The table holding highlights, if any
    pub fn highlighted_side(&self) -> Option<TableSide> {
        if self.source.has_highlights() {
            Some(TableSide::Source)
        } else if self.destination.has_highlights() {
            Some(TableSide::Destination)
        } else {
            None
        }
    }

    fn single_leaf(&self) -> Option<(TableSide, &Row)> {
        let side = self.highlighted_side()?;
        match self.table(side).highlighted_rows().as_slice() {
            [row] if row.is_leaf() => Some((side, *row)),
            _ => None,
        }
    }

    /// Migration source side, if migrating is possible
    pub fn migration_source(&self) -> Option<TableSide> {
        if !(self.source.is_loaded() && self.destination.is_loaded()) {
            return None;
        }
        match (self.source.has_highlights(), self.destination.has_highlights()) {
            (true, false) => Some(TableSide::Source),
            (false, true) => Some(TableSide::Destination),
            _ => None,
        }
    }

    pub fn can_migrate(&self) -> bool {
        self.migration_source().is_some()
    }

    /// The highlighted leaf row and its same-typed correspondence
    pub fn compare_pair(&self) -> Option<(TableSide, &Row, &Row)> {
        let (side, row) = self.single_leaf()?;
        let correspondence = self.correspondence?;
        let partner = self.table(correspondence.side).rows.get(correspondence.index)?;
        (partner.component_type == row.component_type).then_some((side, row, partner))
    }

    pub fn can_compare(&self) -> bool {
        self.compare_pair().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::types::ComponentType;

    fn rows(names: &[(&str, ComponentType)]) -> Vec<Row> {
        names
            .iter()
            .enumerate()
            .map(|(i, (name, t))| Row::new(format!("id-{}", i), *name, *t))
            .collect()
    }

    fn model() -> SelectionModel {
        let mut model = SelectionModel::new();
        model.load(
            TableSide::Source,
            "dev",
            None,
            rows(&[
                ("Group A", ComponentType::ChannelGroup),
                ("ADT in", ComponentType::Channel),
                ("ORU out", ComponentType::Channel),
                ("Billing", ComponentType::Channel),
            ]),
        );
        model.load(
            TableSide::Destination,
            "prod",
            None,
            rows(&[
                ("Group A", ComponentType::ChannelGroup),
                ("ORU out", ComponentType::Channel),
                ("ADT in", ComponentType::Channel),
            ]),
        );
        model
    }

    #[test]
    fn test_single_click_replaces_and_second_click_clears() {
        let mut model = model();
        model.toggle(TableSide::Source, 1, SelectMode::Single);
        model.toggle(TableSide::Source, 2, SelectMode::Single);
        assert_eq!(model.table(TableSide::Source).highlighted(), vec![2]);

        model.toggle(TableSide::Source, 2, SelectMode::Single);
        assert!(model.table(TableSide::Source).highlighted().is_empty());
    }

    #[test]
    fn test_toggle_flips_one_row() {
        let mut model = model();
        model.toggle(TableSide::Source, 1, SelectMode::Toggle);
        model.toggle(TableSide::Source, 3, SelectMode::Toggle);
        assert_eq!(model.table(TableSide::Source).highlighted(), vec![1, 3]);

        model.toggle(TableSide::Source, 1, SelectMode::Toggle);
        assert_eq!(model.table(TableSide::Source).highlighted(), vec![3]);
    }

    #[test]
    fn test_extend_highlights_range_from_anchor() {
        let mut model = model();
        model.toggle(TableSide::Source, 3, SelectMode::Single);
        model.toggle(TableSide::Source, 1, SelectMode::Extend);
        assert_eq!(model.table(TableSide::Source).highlighted(), vec![1, 2, 3]);
    }

    #[test]
    fn test_extend_without_anchor_toggles() {
        let mut model = model();
        model.toggle(TableSide::Source, 2, SelectMode::Extend);
        assert_eq!(model.table(TableSide::Source).highlighted(), vec![2]);
    }

    #[test]
    fn test_click_clears_opposite_table() {
        let mut model = model();
        model.toggle(TableSide::Source, 1, SelectMode::Single);
        model.toggle(TableSide::Destination, 0, SelectMode::Single);

        assert!(!model.table(TableSide::Source).has_highlights());
        assert_eq!(model.migration_source(), Some(TableSide::Destination));
    }

    #[test]
    fn test_correspondence_by_display_name() {
        let mut model = model();
        let correspondence = model.toggle(TableSide::Source, 1, SelectMode::Single);

        assert_eq!(
            correspondence,
            Some(Correspondence {
                side: TableSide::Destination,
                index: 2
            })
        );
        assert!(model.can_compare());

        // No partner on the other side
        model.toggle(TableSide::Source, 3, SelectMode::Single);
        assert_eq!(model.correspondence(), None);
        assert!(!model.can_compare());
    }

    #[test]
    fn test_groups_and_multi_selection_cannot_be_compared() {
        let mut model = model();
        model.toggle(TableSide::Source, 0, SelectMode::Single);
        assert!(!model.can_compare());
        assert!(model.can_migrate());

        model.toggle(TableSide::Source, 1, SelectMode::Toggle);
        assert!(!model.can_compare());
    }

    #[test]
    fn test_migration_needs_both_tables() {
        let mut model = model();
        model.unload(TableSide::Destination);
        model.toggle(TableSide::Source, 1, SelectMode::Single);
        assert!(!model.can_migrate());
    }

    #[test]
    fn test_reload_drops_highlights() {
        let mut model = model();
        model.toggle(TableSide::Source, 1, SelectMode::Single);
        model.load(TableSide::Source, "dev", None, rows(&[("ADT in", ComponentType::Channel)]));

        assert!(!model.table(TableSide::Source).has_highlights());
        assert_eq!(model.correspondence(), None);
    }
}
