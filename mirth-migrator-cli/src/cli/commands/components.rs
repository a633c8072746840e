//! `components` and `show` commands

use anyhow::{Context, Result};
use colored::*;

use crate::cli::console::Console;
use crate::cli::{ComponentsArgs, ShowArgs};
use crate::migration::{Row, SelectMode, TableSide};

pub async fn handle_components_command(console: &mut Console, args: ComponentsArgs) -> Result<()> {
    console
        .load_table(TableSide::Source, &args.system, args.kind.into(), args.refresh)
        .await?;

    let table = console.controller.selection.table(TableSide::Source);
    if let Some(version) = &table.mirth_version {
        println!("{} Mirth {}", args.system.cyan().bold(), version);
    }
    if table.rows.is_empty() {
        println!("{}", "No components".yellow());
        return Ok(());
    }

    for row in &table.rows {
        println!("{}", format_row(row));
    }
    Ok(())
}

fn format_row(row: &Row) -> String {
    if row.is_group() {
        let members = row
            .member_count
            .map(|count| format!(" ({})", count))
            .unwrap_or_default();
        let label = if row.artificial {
            row.label.italic()
        } else {
            row.label.bold()
        };
        return format!("{}{}", label, members.dimmed());
    }

    let mut line = format!("  {}", row.label);
    if row.label != row.component_name {
        line.push_str(&format!(" [{}]", row.component_name));
    }
    if let Some(version) = &row.version {
        line.push_str(&format!("  v{}", version));
    }
    if let Some(date) = &row.display_date {
        line.push_str(&format!("  {}", date));
    }

    if row.disabled {
        format!("{} {}", line.dimmed(), "(disabled)".dimmed())
    } else {
        line
    }
}

pub async fn handle_show_command(console: &mut Console, args: ShowArgs) -> Result<()> {
    console
        .load_table(TableSide::Source, &args.system, args.kind.into(), false)
        .await?;

    let index = console.row_index(TableSide::Source, &args.name)?;
    console.controller.click(TableSide::Source, index, SelectMode::Single);
    console.drive().await?;

    let details = console
        .controller
        .details
        .as_ref()
        .context("The migrator returned no details")?;

    let width = details
        .attributes
        .iter()
        .map(|attribute| attribute.key.len())
        .max()
        .unwrap_or(0);
    for attribute in &details.attributes {
        let key = format!("{:<width$}", attribute.key, width = width);
        let key = if attribute.alert { key.red().bold() } else { key.bold() };
        let mut values = attribute.values.iter();
        println!("{}  {}", key, values.next().map(String::as_str).unwrap_or_default());
        for value in values {
            println!("{:width$}  {}", "", value, width = width);
        }
    }

    if args.content {
        if let Some(content) = &details.content {
            println!();
            println!("{}", content);
        }
    }
    Ok(())
}
