// src/commands/remove.rs
//! Package removal command

use super::print_warnings;
use anyhow::{Context, Result};
use criage::manager::PackageManager;
use criage::registry::Scope;
use tracing::info;

pub fn cmd_uninstall(pm: &PackageManager, package: &str, global: bool, purge: bool) -> Result<()> {
    info!("Removing package: {}", package);
    let outcome = pm
        .uninstall(package, Scope::from_global(global), purge)
        .with_context(|| format!("Failed to remove {}", package))?;

    println!("Removed {}", package);
    print_warnings(&outcome.warnings);
    Ok(())
}
