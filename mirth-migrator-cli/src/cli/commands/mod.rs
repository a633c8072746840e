//! Subcommand handlers

pub mod compare;
pub mod components;
pub mod config;
pub mod migrate;
pub mod systems;
pub mod version;

/// Width used for side-by-side output
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|columns| columns.parse().ok())
        .filter(|width: &usize| *width >= 40)
        .unwrap_or(120)
}
