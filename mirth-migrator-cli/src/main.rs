mod api;
mod app;
mod cli;
mod config;
mod diff;
mod migration;

use anyhow::Result;
use clap::Parser;
use colored::*;
use log::{LevelFilter, debug};

use cli::commands::{compare, components, config as config_command, migrate, systems, version};
use cli::console::Console;
use cli::{Cli, Commands, ConfigAction};
use config::Config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Config file, then `.env` and environment, then flags
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = Config::load_from(&path)?;

    match dotenvy::dotenv() {
        Ok(file) => debug!("Loaded environment from {}", file.display()),
        Err(err) if err.not_found() => {}
        Err(err) => log::warn!("Failed to load .env: {}", err),
    }
    config.apply_env(|key| std::env::var(key).ok());

    if let Some(url) = &cli.url {
        config.server.url = Some(url.clone());
    }
    if let Some(user) = &cli.user {
        config.server.username = Some(user.clone());
    }
    if cli.insecure {
        config.server.accept_invalid_certs = true;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut console = Console::connect(&config)?;

    match cli.command {
        Commands::Systems => systems::handle_systems_command(&mut console).await,
        Commands::Components(args) => components::handle_components_command(&mut console, args).await,
        Commands::Show(args) => components::handle_show_command(&mut console, args).await,
        Commands::Migrate(args) => migrate::handle_migrate_command(&mut console, args).await,
        Commands::Compare(args) => compare::handle_compare_command(&mut console, args).await,
        Commands::Config { action } => match action {
            ConfigAction::Pull { output } => config_command::handle_pull_command(&mut console, output.as_deref()).await,
            ConfigAction::Push { file } => config_command::handle_push_command(&mut console, &file).await,
        },
        Commands::Version => version::handle_version_command(&mut console).await,
    }
}
