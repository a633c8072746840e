//! Local configuration of the console
//!
//! Stored as TOML in `~/.config/mirth-migrator/config.toml`. Values from the
//! environment (and a `.env` file) override the file, command-line flags
//! override both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::diff::{ContextScope, DisplayMode};

pub const ENV_URL: &str = "MIRTH_MIGRATOR_URL";
pub const ENV_USER: &str = "MIRTH_MIGRATOR_USER";
pub const ENV_PASSWORD: &str = "MIRTH_MIGRATOR_PASSWORD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub migration: MigrationSettings,
    pub diff: DiffSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL of the migrator, e.g. `https://mirth.example.org:1337`
    pub url: Option<String>,
    pub username: Option<String>,
    /// Only ever taken from the environment
    #[serde(skip)]
    pub password: Option<String>,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            timeout_secs: 60,
            accept_invalid_certs: false,
        }
    }
}

impl ServerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Also migrate the code templates referenced by migrated channels
    pub migrate_referenced_templates: bool,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            migrate_referenced_templates: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSettings {
    pub display_mode: DisplayMode,
    pub scope: ContextScope,
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mirth-migrator")
        .join("config.toml")
}

impl Config {
    /// Load the config file, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply overrides from environment variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(ENV_URL) {
            self.server.url = Some(url);
        }
        if let Some(user) = non_empty(ENV_USER) {
            self.server.username = Some(user);
        }
        if let Some(password) = non_empty(ENV_PASSWORD) {
            self.server.password = Some(password);
        }
    }

    /// Base URL of the migrator, required for any server call
    pub fn server_url(&self) -> Result<&str> {
        self.server.url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No server URL configured. Set it with --url, {} or in {}",
                ENV_URL,
                default_config_path().display()
            )
        })
    }
}
