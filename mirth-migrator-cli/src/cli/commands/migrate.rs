//! `migrate` command
//!
//! Highlights the named rows in the source table, then walks the migration
//! workflow, asking the operator (or applying `--on-conflict`) for every
//! conflict until the report is shown.

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Select, theme::ColorfulTheme};

use super::terminal_width;
use crate::api::models::{ConflictDetail, MetaDataRow, metadata_rows};
use crate::cli::console::Console;
use crate::cli::{ConflictPolicy, MigrateArgs};
use crate::diff::DiffView;
use crate::migration::workflow::{ComponentConflict, VersionConflict};
use crate::migration::{Resolution, TableSide, WorkflowState};

/// What the operator decided for the presented conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Resolve(Resolution, bool),
    ToggleMode,
    ToggleScope,
    Cancel,
}

pub async fn handle_migrate_command(console: &mut Console, args: MigrateArgs) -> Result<()> {
    if args.from == args.to {
        anyhow::bail!("Source and destination must be different systems");
    }

    let kind = args.kind.into();
    console.load_table(TableSide::Source, &args.from, kind, false).await?;
    console.load_table(TableSide::Destination, &args.to, kind, false).await?;
    console.highlight(TableSide::Source, &args.names)?;

    if args.referenced_templates {
        console.controller.settings_mut().migrate_referenced_templates = true;
    } else if args.no_referenced_templates {
        console.controller.settings_mut().migrate_referenced_templates = false;
    }

    if args.on_conflict.is_none() && !console.is_interactive() {
        anyhow::bail!("No terminal attached, use --on-conflict to decide how conflicts are resolved");
    }

    println!(
        "Migrating {} from {} to {}",
        kind.label(),
        args.from.cyan().bold(),
        args.to.cyan().bold()
    );
    console.controller.start_migration()?;
    console.drive().await?;

    let mut view: Option<DiffView> = None;
    loop {
        let choice = match console.controller.workflow_state() {
            WorkflowState::PresentingVersionConflict(conflict) => {
                print_version_conflict(conflict);
                version_choice(args.on_conflict)?
            }
            WorkflowState::PresentingComponentConflict(conflict) => {
                let diff = view.get_or_insert_with(|| {
                    console
                        .controller
                        .diff_view(
                            conflict.detail.source_content.clone(),
                            conflict.detail.destination_content.clone(),
                        )
                        .with_titles(args.from.clone(), args.to.clone())
                });
                print_component_conflict(conflict, diff);
                component_choice(args.on_conflict, conflict.remaining, diff.present().has_controls())?
            }
            WorkflowState::Done(report) => {
                println!();
                print!("{}", report.render());
                console.controller.acknowledge_report();
                console.drive().await?;
                return Ok(());
            }
            WorkflowState::Idle => {
                println!("{}", "Nothing was migrated".yellow());
                return Ok(());
            }
            other => anyhow::bail!("Migration stopped while {}", other.name()),
        };

        match choice {
            Choice::ToggleMode => {
                if let Some(diff) = view.as_mut() {
                    diff.toggle_mode();
                }
                continue;
            }
            Choice::ToggleScope => {
                if let Some(diff) = view.as_mut() {
                    diff.toggle_scope();
                }
                continue;
            }
            Choice::Cancel => console.controller.cancel_migration(),
            Choice::Resolve(resolution, apply_to_all) => {
                console.controller.resolve_conflict(resolution, apply_to_all)
            }
        }
        view = None;
        console.drive().await?;
    }
}

fn print_version_conflict(conflict: &VersionConflict) {
    println!();
    println!("{}", "Mirth version conflict".red().bold());
    println!(
        "The source runs Mirth {} but the destination runs Mirth {}.",
        conflict.source_version.bold(),
        conflict.destination_version.bold()
    );
    println!("Components might not work as expected on the destination.");
}

fn print_component_conflict(conflict: &ComponentConflict, view: &DiffView) {
    let detail: &ConflictDetail = &conflict.detail;
    println!();
    println!(
        "{} {} '{}'",
        "Conflict:".red().bold(),
        detail.component_type.label(),
        detail.name.bold()
    );
    for message in detail.messages() {
        println!("  {} {}", "•".red(), message);
    }
    if conflict.remaining > 1 {
        println!("{}", format!("{} conflicts left", conflict.remaining).dimmed());
    }

    let rows = metadata_rows(detail.meta_data.as_ref());
    if !rows.is_empty() {
        println!();
        print_metadata(&rows);
    }

    if view.has_code() {
        println!();
        print!("{}", view.render(terminal_width()));
    }
}

/// Source/destination attribute table, differing rows highlighted
pub fn print_metadata(rows: &[MetaDataRow]) {
    let key_width = rows.iter().map(|row| row.attribute.len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|row| row.source.chars().count()).max().unwrap_or(0);
    for row in rows {
        let line = format!(
            "{:<key_width$}  {:<value_width$}  {}",
            row.attribute,
            row.source,
            row.destination,
            key_width = key_width,
            value_width = value_width
        );
        if row.differs() {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
}

fn version_choice(policy: Option<ConflictPolicy>) -> Result<Choice> {
    match policy {
        Some(ConflictPolicy::Migrate) => Ok(Choice::Resolve(Resolution::MigrateAnyway, true)),
        Some(ConflictPolicy::Skip) | Some(ConflictPolicy::Cancel) => {
            println!("{}", "Not migrating across Mirth versions".yellow());
            Ok(Choice::Cancel)
        }
        None => {
            let items = ["Migrate anyway", "Cancel migration"];
            let index = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("How do you want to continue?")
                .items(&items)
                .default(1)
                .interact()
                .context("Failed to read choice")?;
            Ok(if index == 0 {
                Choice::Resolve(Resolution::MigrateAnyway, false)
            } else {
                Choice::Cancel
            })
        }
    }
}

fn component_choice(policy: Option<ConflictPolicy>, remaining: usize, has_controls: bool) -> Result<Choice> {
    match policy {
        Some(ConflictPolicy::Migrate) => return Ok(Choice::Resolve(Resolution::MigrateAnyway, true)),
        Some(ConflictPolicy::Skip) => return Ok(Choice::Resolve(Resolution::Skip, true)),
        Some(ConflictPolicy::Cancel) => return Ok(Choice::Cancel),
        None => {}
    }

    let mut choices = vec![
        ("Migrate anyway".to_string(), Choice::Resolve(Resolution::MigrateAnyway, false)),
        ("Skip".to_string(), Choice::Resolve(Resolution::Skip, false)),
    ];
    if remaining > 1 {
        choices.push((
            format!("Migrate all {} anyway", remaining),
            Choice::Resolve(Resolution::MigrateAnyway, true),
        ));
        choices.push((format!("Skip all {}", remaining), Choice::Resolve(Resolution::Skip, true)));
    }
    if has_controls {
        choices.push(("Switch inline / side-by-side".to_string(), Choice::ToggleMode));
        choices.push(("Show differences / everything".to_string(), Choice::ToggleScope));
    }
    choices.push(("Cancel migration".to_string(), Choice::Cancel));

    let labels: Vec<&str> = choices.iter().map(|(label, _)| label.as_str()).collect();
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("How do you want to resolve this conflict?")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read choice")?;
    Ok(choices[index].1)
}
