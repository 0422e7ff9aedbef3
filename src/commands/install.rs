// src/commands/install.rs
//! Package installation command

use super::print_warnings;
use anyhow::{Context, Result};
use criage::manager::{InstallOptions, InstallStatus, PackageManager};
use criage::registry::Scope;
use tracing::info;

#[allow(clippy::too_many_arguments)]
pub fn cmd_install(
    pm: &PackageManager,
    package: &str,
    global: bool,
    version: Option<String>,
    force: bool,
    dev: bool,
    arch: Option<String>,
    os: Option<String>,
) -> Result<()> {
    info!("Installing package: {}", package);
    let options = InstallOptions {
        version,
        scope: Scope::from_global(global),
        force,
        dev,
        arch,
        os,
    };

    let outcome = pm
        .install(package, &options)
        .with_context(|| format!("Failed to install {}", package))?;

    match outcome.status {
        InstallStatus::AlreadyInstalled => println!(
            "{} {} is already installed ({})",
            outcome.name, outcome.version, outcome.scope
        ),
        InstallStatus::Installed => println!(
            "Installed {} {} ({})",
            outcome.name, outcome.version, outcome.scope
        ),
    }
    print_warnings(&outcome.warnings);
    Ok(())
}
