// src/commands/repo.rs
//! Repository management commands

use anyhow::{Context, Result};
use criage::config::ConfigManager;
use tracing::info;

/// Add a repository
pub fn cmd_repo_add(
    config: &mut ConfigManager,
    name: &str,
    url: &str,
    priority: i32,
    repo_type: &str,
) -> Result<()> {
    info!("Adding repository: {} ({})", name, url);
    config
        .add_repository(name, url, repo_type, priority)
        .with_context(|| format!("Failed to add repository {}", name))?;

    println!("Added repository: {}", name);
    println!("  URL: {}", url.trim_end_matches('/'));
    println!("  Priority: {}", priority);
    Ok(())
}

/// Remove a repository
pub fn cmd_repo_remove(config: &mut ConfigManager, name: &str) -> Result<()> {
    info!("Removing repository: {}", name);
    config
        .remove_repository(name)
        .with_context(|| format!("Failed to remove repository {}", name))?;
    println!("Removed repository: {}", name);
    Ok(())
}

/// List configured repositories
pub fn cmd_repo_list(config: &ConfigManager) -> Result<()> {
    let mut repos = config.repositories().to_vec();
    if repos.is_empty() {
        println!("No repositories configured");
        return Ok(());
    }
    repos.sort_by(|a, b| b.priority.cmp(&a.priority));

    println!("Repositories:");
    for repo in repos {
        let enabled_mark = if repo.enabled { "[x]" } else { "[ ]" };
        println!(
            "  {} {} (priority: {}, type: {})",
            enabled_mark, repo.name, repo.priority, repo.repo_type
        );
        println!("      {}", repo.url);
    }
    Ok(())
}
