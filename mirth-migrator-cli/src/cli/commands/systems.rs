//! `systems` command

use anyhow::Result;
use colored::*;

use crate::cli::console::Console;

pub async fn handle_systems_command(console: &mut Console) -> Result<()> {
    console.controller.load_systems();
    console.drive().await?;

    let controller = &console.controller;
    if controller.systems.is_empty() {
        println!("{}", "No systems configured".yellow());
        return Ok(());
    }

    if !controller.environments.is_empty() {
        let names: Vec<&str> = controller.environments.iter().map(|e| e.name.as_str()).collect();
        println!("{} {}", "Environments:".bold(), names.join(", "));
        println!();
    }

    let width = controller
        .systems
        .iter()
        .map(|system| system.name.len())
        .max()
        .unwrap_or(0);

    println!("{}", "Systems:".bold());
    for system in &controller.systems {
        let description = system
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| format!("  {}", d.dimmed()))
            .unwrap_or_default();
        println!(
            "  {}  {}{}",
            format!("{:<width$}", system.name, width = width).cyan(),
            system.server,
            description
        );
    }
    Ok(())
}
