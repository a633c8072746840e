//! Terminal front end of a controller
//!
//! Drives the controller's work list, asks for credentials whenever calls
//! are waiting for a login and prints notices as they come in.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use is_terminal::IsTerminal;
use log::{debug, info};
use tokio::task::JoinHandle;

use crate::api::models::{ComponentKind, SystemInfo};
use crate::api::{BusyIndicator, HttpTransport, LoginPrompt, Transport};
use crate::app::{Controller, ControllerSettings, Notice};
use crate::config::Config;
use crate::migration::{SelectMode, TableSide};

const MAX_LOGIN_ATTEMPTS: usize = 3;
const ACTIVITY_TICK: Duration = Duration::from_millis(200);

pub struct Console<T: Transport = HttpTransport> {
    pub controller: Controller<T>,
    username: Option<String>,
    password: Option<String>,
    interactive: bool,
    attempts: usize,
}

impl Console<HttpTransport> {
    pub fn connect(config: &Config) -> Result<Self> {
        let url = config.server_url()?;
        let transport = HttpTransport::new(url, config.server.timeout(), config.server.accept_invalid_certs)
            .context("Failed to create HTTP client")?;
        info!("Using migrator at {}", transport.base_url());

        let controller = Controller::new(transport, settings_from(config));

        Ok(Self::new(
            controller,
            config.server.username.clone(),
            config.server.password.clone(),
            io::stdin().is_terminal(),
        ))
    }
}

impl<T: Transport> Console<T> {
    pub fn new(controller: Controller<T>, username: Option<String>, password: Option<String>, interactive: bool) -> Self {
        if let (Some(user), Some(pass)) = (&username, &password) {
            controller.set_credentials(user, pass);
        }

        Self {
            controller,
            username,
            password,
            interactive,
            attempts: 0,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Run queued work to completion, logging in as often as needed
    ///
    /// Fails when a notice requires the operator's attention. A changed
    /// server configuration is acknowledged and reloaded once, the command
    /// then fails since everything it loaded is gone.
    pub async fn drive(&mut self) -> Result<()> {
        let mut reloaded = false;
        self.run_work().await;
        loop {
            if self.report_notices()? {
                if reloaded {
                    anyhow::bail!("The server configuration keeps changing, try again later");
                }
                self.acknowledge_reload()?;
                reloaded = true;
                self.run_work().await;
                continue;
            }
            let Some(prompt) = self.controller.take_login_prompt() else {
                break;
            };
            self.login(prompt).await?;
        }

        if reloaded {
            anyhow::bail!(
                "Reloaded {} system(s) after the server configuration changed. Run the command again.",
                self.controller.systems.len()
            );
        }
        Ok(())
    }

    async fn run_work(&mut self) {
        let _activity = ActivityLine::start(self.controller.guard().busy().clone(), self.shows_activity());
        self.controller.run().await;
    }

    fn shows_activity(&self) -> bool {
        self.interactive && io::stderr().is_terminal()
    }

    fn acknowledge_reload(&mut self) -> Result<()> {
        eprintln!(
            "{} {}",
            "!".yellow().bold(),
            "The server configuration has been changed by someone else.".yellow()
        );
        if self.interactive {
            Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("Press Enter to reload")
                .allow_empty(true)
                .interact_text()
                .context("Failed to read acknowledgement")?;
        }
        self.controller.acknowledge_reload();
        Ok(())
    }

    async fn login(&mut self, prompt: LoginPrompt) -> Result<()> {
        self.attempts += 1;
        if self.attempts > MAX_LOGIN_ATTEMPTS {
            anyhow::bail!("Giving up after {} failed login attempts", MAX_LOGIN_ATTEMPTS);
        }

        if let Some(reason) = &prompt.reason {
            eprintln!("{} {}", "!".yellow().bold(), reason.yellow());
        }

        // Credentials from the environment are only tried once
        let (username, password) = match (self.username.clone(), self.password.take()) {
            (Some(user), Some(pass)) if prompt.reason.is_none() => (user, pass),
            (user, _) => self.ask_credentials(user)?,
        };

        debug!("Logging in as {}", username);
        let _activity = ActivityLine::start(self.controller.guard().busy().clone(), self.shows_activity());
        self.controller.login(&username, &password).await;
        self.username = Some(username);
        Ok(())
    }

    fn ask_credentials(&self, username: Option<String>) -> Result<(String, String)> {
        if !self.interactive {
            anyhow::bail!(
                "Login required but no terminal is attached. Set {} and {}",
                crate::config::ENV_USER,
                crate::config::ENV_PASSWORD
            );
        }

        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme).with_prompt("Username");
        if let Some(user) = username {
            input = input.default(user);
        }
        let username = input.interact_text().context("Failed to read username")?;
        let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
        Ok((username, password))
    }

    /// Print collected notices; true when the client state has to be reloaded
    fn report_notices(&mut self) -> Result<bool> {
        let mut reload = false;
        for notice in self.controller.take_notices() {
            match notice {
                Notice::Error { status, message } => {
                    let status = if status == 0 {
                        "connection".to_string()
                    } else {
                        status.to_string()
                    };
                    anyhow::bail!("Migrator request failed ({}): {}", status, message);
                }
                Notice::Unavailable { message } => {
                    anyhow::bail!("The migrator is not available: {}", message);
                }
                Notice::ReloadRequired => reload = true,
                Notice::ConfigurationRequired => {
                    eprintln!(
                        "{} The migrator has no configuration yet. Use {} and {} to set it up.",
                        "!".yellow().bold(),
                        "config pull".cyan(),
                        "config push".cyan()
                    );
                }
                Notice::ConfigurationUnchanged => {
                    println!("{}", "Configuration unchanged, nothing to save".dimmed());
                }
                Notice::ConfigurationSaved => {
                    println!("{} Configuration saved", "✓".green().bold());
                }
                Notice::NothingSelected => {
                    anyhow::bail!("Please select something to migrate");
                }
            }
        }
        Ok(reload)
    }

    /// Look up a system by name, suggesting close matches on a miss
    pub async fn system(&mut self, name: &str) -> Result<SystemInfo> {
        if self.controller.systems.is_empty() {
            self.controller.load_systems();
            self.drive().await?;
        }

        if let Some(system) = self.controller.find_system(name) {
            return Ok(system.clone());
        }

        let names: Vec<String> = self.controller.systems.iter().map(|s| s.name.clone()).collect();
        anyhow::bail!("Unknown system '{}'{}", name, suggestion(name, &names));
    }

    /// Load a system's components into one of the tables
    pub async fn load_table(&mut self, side: TableSide, system: &str, kind: ComponentKind, refresh: bool) -> Result<()> {
        self.system(system).await?;
        self.controller.set_component_kind(kind);
        self.controller.select_system(side, system, refresh);
        self.drive().await?;

        if !self.controller.selection.table(side).is_loaded() {
            anyhow::bail!("Failed to load the {} of {}", kind.label(), system);
        }
        Ok(())
    }

    /// Position of the row with the given display name, suggesting close matches on a miss
    pub fn row_index(&self, side: TableSide, name: &str) -> Result<usize> {
        let table = self.controller.selection.table(side);
        if let Some(index) = table.position(name) {
            return Ok(index);
        }

        let labels: Vec<String> = table.rows.iter().map(|row| row.label.clone()).collect();
        anyhow::bail!(
            "No component named '{}' on {}{}",
            name,
            table.system.as_deref().unwrap_or("?"),
            suggestion(name, &labels)
        );
    }

    /// Highlight the rows with the given display names in one table
    pub fn highlight(&mut self, side: TableSide, names: &[String]) -> Result<()> {
        for name in names {
            let index = self.row_index(side, name)?;
            if !self.controller.selection.table(side).is_highlighted(index) {
                self.controller.selection.toggle(side, index, SelectMode::Toggle);
            }
        }
        Ok(())
    }
}

/// "working…" line on stderr while calls are in flight, cleared on drop
struct ActivityLine {
    task: Option<JoinHandle<()>>,
}

impl ActivityLine {
    fn start(busy: BusyIndicator, enabled: bool) -> Self {
        let task = enabled.then(|| {
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(ACTIVITY_TICK);
                let mut shown = false;
                loop {
                    ticker.tick().await;
                    if busy.is_busy() {
                        eprint!("\r\x1b[2K{} ({} call(s))", "working…".dimmed(), busy.active());
                        shown = true;
                    } else if shown {
                        eprint!("\r\x1b[2K");
                        shown = false;
                    }
                }
            })
        });
        Self { task }
    }
}

impl Drop for ActivityLine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            eprint!("\r\x1b[2K");
        }
    }
}

/// " (did you mean ...?)" for the closest candidates, or nothing
pub fn suggestion(input: &str, candidates: &[String]) -> String {
    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(&String, i64)> = candidates
        .iter()
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, input)
                .map(|score| (candidate, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let best: Vec<&str> = scored.iter().take(3).map(|(name, _)| name.as_str()).collect();
    if best.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", best.join(", "))
    }
}

pub fn settings_from(config: &Config) -> ControllerSettings {
    ControllerSettings {
        migrate_referenced_templates: config.migration.migrate_referenced_templates,
        display_mode: config.diff.display_mode,
        scope: config.diff.scope,
    }
}
