//! `compare` command

use anyhow::{Context, Result};
use colored::*;

use super::migrate::print_metadata;
use super::terminal_width;
use crate::cli::CompareArgs;
use crate::cli::console::Console;
use crate::migration::{SelectMode, TableSide};

pub async fn handle_compare_command(console: &mut Console, args: CompareArgs) -> Result<()> {
    let kind = args.kind.into();
    console.load_table(TableSide::Source, &args.from, kind, false).await?;
    console.load_table(TableSide::Destination, &args.to, kind, false).await?;

    let index = console.row_index(TableSide::Source, &args.name)?;
    console.controller.selection.toggle(TableSide::Source, index, SelectMode::Single);

    if args.target_id.is_none() && !console.controller.selection.can_compare() {
        anyhow::bail!(
            "'{}' has no counterpart of the same type on {}, use --target-id to pick one",
            args.name,
            args.to
        );
    }
    console.controller.compare(args.target_id.clone())?;
    console.drive().await?;

    let comparison = console
        .controller
        .comparison
        .as_mut()
        .context("The migrator returned no comparison")?;
    if let Some(mode) = args.mode {
        comparison.view.mode = mode;
    }
    if let Some(scope) = args.scope {
        comparison.view.scope = scope;
    }

    println!(
        "{} {} '{}'",
        "Comparing".bold(),
        comparison.component_type.label(),
        comparison.name.bold()
    );

    if !comparison.metadata.is_empty() {
        println!();
        print_metadata(&comparison.metadata);
    }

    if comparison.view.has_code() {
        println!();
        print!("{}", comparison.view.render(terminal_width()));
    }
    Ok(())
}
