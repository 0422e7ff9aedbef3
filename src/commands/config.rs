// src/commands/config.rs
//! Client settings commands

use anyhow::{Context, Result};
use criage::config::ConfigManager;

pub fn cmd_config_set(config: &mut ConfigManager, key: &str, value: &str) -> Result<()> {
    config
        .set_value(key, value)
        .with_context(|| format!("Failed to set {}", key))?;
    println!("{} = {}", key, config.get_value(key)?);
    Ok(())
}

pub fn cmd_config_get(config: &ConfigManager, key: &str) -> Result<()> {
    let value = config
        .get_value(key)
        .with_context(|| format!("Setting {} not found", key))?;
    println!("{}", value);
    Ok(())
}

pub fn cmd_config_list(config: &ConfigManager) -> Result<()> {
    println!("Configuration ({}):", config.path().display());
    for (key, value) in config.list_values() {
        println!("  {} = {}", key, value);
    }
    Ok(())
}
