//! `config pull` and `config push` commands

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use crate::api::models::ServerConfiguration;
use crate::cli::console::Console;

pub async fn handle_pull_command(console: &mut Console, output: Option<&Path>) -> Result<()> {
    console.controller.pull_configuration();
    console.drive().await?;

    let configuration = console
        .controller
        .configuration
        .as_ref()
        .context("The migrator returned no configuration")?;
    let json = serde_json::to_string_pretty(configuration).context("Failed to serialize configuration")?;

    match output {
        Some(path) => {
            fs::write(path, format!("{}\n", json))
                .with_context(|| format!("Failed to write configuration to: {}", path.display()))?;
            println!("Configuration written to {}", path.display().to_string().cyan());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub async fn handle_push_command(console: &mut Console, file: &Path) -> Result<()> {
    let configuration = read_configuration(file)?;

    // Compare against what the server currently has
    console.controller.pull_configuration();
    console.drive().await?;

    console.controller.push_configuration(configuration);
    console.drive().await?;

    if !console.controller.systems.is_empty() {
        println!(
            "{} system(s) configured",
            console.controller.systems.len().to_string().bold()
        );
    }
    Ok(())
}

fn read_configuration(file: &Path) -> Result<ServerConfiguration> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read configuration file: {}", file.display()))?;
    let configuration: ServerConfiguration = serde_json::from_str(&content)
        .with_context(|| format!("Invalid configuration in {}", file.display()))?;

    for system in &configuration.system {
        if system.name.trim().is_empty() || system.server.trim().is_empty() {
            anyhow::bail!("Every system needs a name and a server");
        }
    }
    Ok(configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_configuration_rejects_incomplete_systems() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"environment": [], "system": [{{"name": "prod", "server": ""}}]}}"#).unwrap();
        let err = read_configuration(file.path()).unwrap_err();
        assert!(err.to_string().contains("name and a server"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"system": [{{"name": "prod", "server": "mirth.local"}}]}}"#).unwrap();
        let configuration = read_configuration(file.path()).unwrap();
        assert_eq!(configuration.system[0].server, "mirth.local");
    }
}
