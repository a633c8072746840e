//! `version` command

use anyhow::Result;
use colored::*;

use crate::cli::console::Console;

pub async fn handle_version_command(console: &mut Console) -> Result<()> {
    console.controller.load_systems();
    console.drive().await?;

    println!("mirth-migrator {}", env!("CARGO_PKG_VERSION"));
    match &console.controller.migrator_version {
        Some(version) => println!("Mirth Migrator server {}", version.cyan()),
        None => println!("Mirth Migrator server {}", "unknown".dimmed()),
    }
    Ok(())
}
