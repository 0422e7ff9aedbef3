// src/commands/mod.rs
//! Command handlers for the criage CLI

mod build;
mod config;
mod install;
mod query;
mod remove;
mod repo;
mod update;

pub use build::{cmd_build, cmd_create, cmd_metadata, cmd_publish};
pub use config::{cmd_config_get, cmd_config_list, cmd_config_set};
pub use install::cmd_install;
pub use query::{cmd_info, cmd_list, cmd_search};
pub use remove::cmd_uninstall;
pub use repo::{cmd_repo_add, cmd_repo_list, cmd_repo_remove};
pub use update::cmd_update;

/// Format size as human-readable
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.1} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.1} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Print advisory failures returned by the core
pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}
