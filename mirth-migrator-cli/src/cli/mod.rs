//! Command-line interface

pub mod commands;
pub mod console;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::api::models::ComponentKind;
use crate::diff::{ContextScope, DisplayMode};

#[derive(Parser)]
#[command(name = "mirth-migrator")]
#[command(about = "Compare and migrate Mirth Connect channels and code templates between instances")]
#[command(version)]
pub struct Cli {
    /// Migrator base URL (overrides config and MIRTH_MIGRATOR_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// User to log in as
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Accept self-signed server certificates
    #[arg(long, global = true)]
    pub insecure: bool,

    /// More output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List environments and systems known to the migrator
    Systems,
    /// List the channels or code templates of a system
    Components(ComponentsArgs),
    /// Show the details of one component
    Show(ShowArgs),
    /// Migrate components from one system to another
    Migrate(MigrateArgs),
    /// Compare a component between two systems
    Compare(CompareArgs),
    /// Read or write the migrator's server configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show client and migrator versions
    Version,
}

/// Which component table to work on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    #[default]
    Channels,
    CodeTemplates,
}

impl From<KindArg> for ComponentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Channels => ComponentKind::Channels,
            KindArg::CodeTemplates => ComponentKind::CodeTemplates,
        }
    }
}

#[derive(Args)]
pub struct ComponentsArgs {
    /// System name
    pub system: String,

    #[arg(long, short, value_enum, default_value_t = KindArg::Channels)]
    pub kind: KindArg,

    /// Ask the migrator to re-read the system instead of using its cache
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// System name
    pub system: String,

    /// Display name of the component
    pub name: String,

    #[arg(long, short, value_enum, default_value_t = KindArg::Channels)]
    pub kind: KindArg,

    /// Also print the component's code
    #[arg(long)]
    pub content: bool,
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Source system
    #[arg(long)]
    pub from: String,

    /// Destination system
    #[arg(long)]
    pub to: String,

    /// Display names of the components or groups to migrate
    #[arg(required = true)]
    pub names: Vec<String>,

    #[arg(long, short, value_enum, default_value_t = KindArg::Channels)]
    pub kind: KindArg,

    /// Also migrate code templates referenced by the channels
    #[arg(long, overrides_with = "no_referenced_templates")]
    pub referenced_templates: bool,

    /// Do not migrate referenced code templates
    #[arg(long)]
    pub no_referenced_templates: bool,

    /// Resolve every conflict without asking
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictPolicy>,
}

/// Conflict handling without prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictPolicy {
    /// Migrate conflicting components anyway
    Migrate,
    /// Leave conflicting components out
    Skip,
    /// Abort on the first conflict
    Cancel,
}

#[derive(Args)]
pub struct CompareArgs {
    /// System holding the component
    #[arg(long)]
    pub from: String,

    /// System to compare with
    #[arg(long)]
    pub to: String,

    /// Display name of the component
    pub name: String,

    #[arg(long, short, value_enum, default_value_t = KindArg::Channels)]
    pub kind: KindArg,

    /// Compare with this component id instead of the one with the same name
    #[arg(long)]
    pub target_id: Option<String>,

    #[arg(long, value_enum)]
    pub mode: Option<DisplayMode>,

    #[arg(long, value_enum)]
    pub scope: Option<ContextScope>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the server configuration as JSON
    Pull {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the server configuration with the content of a JSON file
    Push {
        file: PathBuf,
    },
}
