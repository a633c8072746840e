//! Line diff of the code of two component versions
//!
//! The inline view shows what migrating would change on the destination:
//! lines only present on the destination are removed (red), lines only
//! present on the source are added (green). The side-by-side view puts the
//! source on the left and the destination on the right.

use colored::*;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, DiffOp, DiffTag, TextDiff};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Message shown instead of a diff when both sides are equal
pub const IDENTICAL_MESSAGE: &str = "The code of both elements is identical";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    #[default]
    Inline,
    SideBySide,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Inline => Self::SideBySide,
            Self::SideBySide => Self::Inline,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ContextScope {
    /// Only changed lines plus one line of context
    #[default]
    Differences,
    Everything,
}

impl ContextScope {
    pub fn toggled(self) -> Self {
        match self {
            Self::Differences => Self::Everything,
            Self::Everything => Self::Differences,
        }
    }
}

/// A line of the inline view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineLine {
    pub tag: ChangeTag,
    /// 1-based line number on the destination
    pub old_line: Option<usize>,
    /// 1-based line number on the source
    pub new_line: Option<usize>,
    pub text: String,
}

/// A row of the side-by-side view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePair {
    pub tag: DiffTag,
    /// Line number and text on the source
    pub left: Option<(usize, String)>,
    /// Line number and text on the destination
    pub right: Option<(usize, String)>,
}

/// What the diff section shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffPresentation {
    /// At least one side has no code (groups and libraries)
    NoCode,
    Identical,
    /// Hunks separated by skipped equal lines
    Inline(Vec<Vec<InlineLine>>),
    SideBySide(Vec<Vec<SidePair>>),
}

impl DiffPresentation {
    /// Whether display mode and context controls apply
    pub fn has_controls(&self) -> bool {
        matches!(self, Self::Inline(_) | Self::SideBySide(_))
    }
}

#[derive(Debug, Clone)]
pub struct DiffView {
    source: Option<String>,
    destination: Option<String>,
    source_title: String,
    destination_title: String,
    pub mode: DisplayMode,
    pub scope: ContextScope,
}

impl DiffView {
    pub fn new(source: Option<String>, destination: Option<String>) -> Self {
        Self {
            source,
            destination,
            source_title: "source".to_string(),
            destination_title: "destination".to_string(),
            mode: DisplayMode::default(),
            scope: ContextScope::default(),
        }
    }

    pub fn with_titles(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.source_title = source.into();
        self.destination_title = destination.into();
        self
    }

    pub fn with_mode(mut self, mode: DisplayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scope(mut self, scope: ContextScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn toggle_scope(&mut self) {
        self.scope = self.scope.toggled();
    }

    pub fn has_code(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }

    pub fn present(&self) -> DiffPresentation {
        let (Some(source), Some(destination)) = (self.source.as_deref(), self.destination.as_deref()) else {
            return DiffPresentation::NoCode;
        };

        let (base, new) = match self.mode {
            DisplayMode::Inline => (destination, source),
            DisplayMode::SideBySide => (source, destination),
        };
        let diff = TextDiff::from_lines(base, new);

        if diff.ops().iter().all(|op| op.tag() == DiffTag::Equal) {
            return DiffPresentation::Identical;
        }

        let groups = match self.scope {
            ContextScope::Differences => diff.grouped_ops(1),
            ContextScope::Everything => vec![diff.ops().to_vec()],
        };

        match self.mode {
            DisplayMode::Inline => DiffPresentation::Inline(
                groups
                    .iter()
                    .map(|group| {
                        group
                            .iter()
                            .flat_map(|op| diff.iter_changes(op))
                            .map(|change| InlineLine {
                                tag: change.tag(),
                                old_line: change.old_index().map(|i| i + 1),
                                new_line: change.new_index().map(|i| i + 1),
                                text: strip_newline(change.value()),
                            })
                            .collect()
                    })
                    .collect(),
            ),
            DisplayMode::SideBySide => {
                let old_lines = diff.old_slices();
                let new_lines = diff.new_slices();
                DiffPresentation::SideBySide(
                    groups
                        .iter()
                        .map(|group| {
                            group
                                .iter()
                                .flat_map(|op| side_pairs(op, old_lines, new_lines))
                                .collect()
                        })
                        .collect(),
                )
            }
        }
    }

    /// Render the diff for a terminal of the given width
    pub fn render(&self, width: usize) -> String {
        let mut out = String::new();

        match self.present() {
            DiffPresentation::NoCode => {}
            DiffPresentation::Identical => {
                out.push_str(&format!("{}\n", IDENTICAL_MESSAGE.bold()));
            }
            DiffPresentation::Inline(hunks) => {
                out.push_str(&format!("{}\n", format!("--- {}", self.destination_title).red()));
                out.push_str(&format!("{}\n", format!("+++ {}", self.source_title).green()));
                for (index, hunk) in hunks.iter().enumerate() {
                    if index > 0 {
                        out.push_str(&format!("{}\n", "...".dimmed()));
                    }
                    for line in hunk {
                        let number = line
                            .new_line
                            .or(line.old_line)
                            .map(|n| format!("{:>5}", n))
                            .unwrap_or_else(|| " ".repeat(5));
                        let rendered = match line.tag {
                            ChangeTag::Equal => format!("  {}", line.text).normal(),
                            ChangeTag::Delete => format!("- {}", line.text).red(),
                            ChangeTag::Insert => format!("+ {}", line.text).green(),
                        };
                        out.push_str(&format!("{} {}\n", number.dimmed(), rendered));
                    }
                }
            }
            DiffPresentation::SideBySide(hunks) => {
                let column = width.saturating_sub(15).max(20) / 2;
                out.push_str(&format!(
                    "      {} │       {}\n",
                    fit(&self.source_title, column).bold(),
                    fit(&self.destination_title, column).bold()
                ));
                for (index, hunk) in hunks.iter().enumerate() {
                    if index > 0 {
                        out.push_str(&format!("{}\n", "...".dimmed()));
                    }
                    for pair in hunk {
                        out.push_str(&format!(
                            "{} │ {}\n",
                            side_cell(pair.left.as_ref(), column, pair.tag, true),
                            side_cell(pair.right.as_ref(), column, pair.tag, false)
                        ));
                    }
                }
            }
        }

        out
    }
}

fn strip_newline(text: &str) -> String {
    text.trim_end_matches(['\n', '\r']).to_string()
}

fn side_pairs(op: &DiffOp, old_lines: &[&str], new_lines: &[&str]) -> Vec<SidePair> {
    let (tag, old_range, new_range) = op.as_tag_tuple();
    let rows = old_range.len().max(new_range.len());

    (0..rows)
        .map(|offset| {
            let left = (tag != DiffTag::Insert && offset < old_range.len()).then(|| {
                let index = old_range.start + offset;
                (index + 1, strip_newline(old_lines[index]))
            });
            let right = (tag != DiffTag::Delete && offset < new_range.len()).then(|| {
                let index = new_range.start + offset;
                (index + 1, strip_newline(new_lines[index]))
            });
            SidePair { tag, left, right }
        })
        .collect()
}

/// Truncate or pad to exactly `width` terminal columns
fn fit(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    let padding = width.saturating_sub(out.width());
    out.push_str(&" ".repeat(padding));
    out
}

fn side_cell(cell: Option<&(usize, String)>, width: usize, tag: DiffTag, left: bool) -> String {
    let Some((number, text)) = cell else {
        return " ".repeat(width + 6);
    };

    let body = fit(&text.replace('\t', "    "), width);
    let body = match (tag, left) {
        (DiffTag::Equal, _) => body.normal(),
        (_, true) => body.red(),
        (_, false) => body.green(),
    };
    format!("{} {}", format!("{:>5}", number).dimmed(), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(lines: &[&str]) -> Option<String> {
        Some(lines.iter().map(|l| format!("{}\n", l)).collect())
    }

    #[test]
    fn test_identical_code_has_no_controls() {
        let view = DiffView::new(code(&["a", "b"]), code(&["a", "b"]));
        let presentation = view.present();

        assert_eq!(presentation, DiffPresentation::Identical);
        assert!(!presentation.has_controls());
        assert!(view.render(120).contains(IDENTICAL_MESSAGE));
    }

    #[test]
    fn test_missing_code_hides_section() {
        let view = DiffView::new(None, code(&["a"]));
        assert_eq!(view.present(), DiffPresentation::NoCode);
        assert!(view.render(120).is_empty());
    }

    #[test]
    fn test_inline_marks_source_lines_as_added() {
        let view = DiffView::new(code(&["a", "new", "c"]), code(&["a", "old", "c"]));

        let DiffPresentation::Inline(hunks) = view.present() else {
            panic!("expected inline diff");
        };
        let lines: Vec<_> = hunks[0]
            .iter()
            .map(|l| (l.tag, l.text.as_str()))
            .collect();
        assert_eq!(
            lines,
            vec![
                (ChangeTag::Equal, "a"),
                (ChangeTag::Delete, "old"),
                (ChangeTag::Insert, "new"),
                (ChangeTag::Equal, "c"),
            ]
        );
    }

    #[test]
    fn test_differences_scope_keeps_one_line_of_context() {
        let source = code(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "x"]);
        let destination = code(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);

        let view = DiffView::new(source.clone(), destination.clone());
        let DiffPresentation::Inline(hunks) = view.present() else {
            panic!("expected inline diff");
        };
        assert_eq!(hunks.len(), 1);
        let texts: Vec<_> = hunks[0].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["9", "10", "x"]);

        let everything = DiffView::new(source, destination).with_scope(ContextScope::Everything);
        let DiffPresentation::Inline(hunks) = everything.present() else {
            panic!("expected inline diff");
        };
        assert_eq!(hunks[0].len(), 11);
    }

    #[test]
    fn test_side_by_side_puts_source_left() {
        let view = DiffView::new(code(&["same", "left only"]), code(&["same", "right only"]))
            .with_mode(DisplayMode::SideBySide);

        let DiffPresentation::SideBySide(hunks) = view.present() else {
            panic!("expected side-by-side diff");
        };
        let changed: Vec<_> = hunks[0].iter().filter(|p| p.tag != DiffTag::Equal).collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].left, Some((2, "left only".to_string())));
        assert_eq!(changed[0].right, Some((2, "right only".to_string())));
    }

    #[test]
    fn test_toggles() {
        let mut view = DiffView::new(None, None);
        view.toggle_mode();
        view.toggle_scope();
        assert_eq!(view.mode, DisplayMode::SideBySide);
        assert_eq!(view.scope, ContextScope::Everything);
    }

    #[test]
    fn test_fit_pads_and_truncates_by_width() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 3), "abc");
        assert_eq!(fit("日本", 3).width(), 3);
    }
}
