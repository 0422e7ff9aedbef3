// src/main.rs

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, ConfigCommands, RepoCommands};
use criage::config::ConfigManager;
use criage::manager::PackageManager;
use std::path::Path;

fn load_config(path: Option<&Path>) -> Result<ConfigManager> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => ConfigManager::default_path()?,
    };
    ConfigManager::load_or_init(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

fn open_manager(path: Option<&Path>) -> Result<PackageManager> {
    PackageManager::open(path).context("Failed to initialize package manager")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config(command) => {
            let mut config = load_config(config_path)?;
            match command {
                ConfigCommands::Set { key, value } => {
                    commands::cmd_config_set(&mut config, &key, &value)
                }
                ConfigCommands::Get { key } => commands::cmd_config_get(&config, &key),
                ConfigCommands::List => commands::cmd_config_list(&config),
            }
        }

        Commands::Repo(command) => {
            let mut config = load_config(config_path)?;
            match command {
                RepoCommands::Add {
                    name,
                    url,
                    priority,
                    repo_type,
                } => commands::cmd_repo_add(&mut config, &name, &url, priority, &repo_type),
                RepoCommands::Remove { name } => commands::cmd_repo_remove(&mut config, &name),
                RepoCommands::List => commands::cmd_repo_list(&config),
            }
        }

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "criage", &mut std::io::stdout());
            Ok(())
        }

        command => {
            let pm = open_manager(config_path)?;
            let result = run(&pm, command);
            pm.close();
            result
        }
    }
}

fn run(pm: &PackageManager, command: Commands) -> Result<()> {
    match command {
        Commands::Install {
            package,
            global,
            version,
            force,
            dev,
            arch,
            os,
        } => commands::cmd_install(pm, &package, global, version, force, dev, arch, os),

        Commands::Uninstall {
            package,
            global,
            purge,
        } => commands::cmd_uninstall(pm, &package, global, purge),

        Commands::Update { package, all } => commands::cmd_update(pm, package.as_deref(), all),

        Commands::Search { query } => commands::cmd_search(pm, &query),

        Commands::List {
            global,
            all_scopes,
            outdated,
        } => commands::cmd_list(pm, global, all_scopes, outdated),

        Commands::Info { package } => commands::cmd_info(pm, &package),

        Commands::Create {
            name,
            template,
            author,
            description,
        } => commands::cmd_create(pm, &name, &template, &author, &description),

        Commands::Build {
            output,
            format,
            level,
        } => commands::cmd_build(pm, output, format.as_deref(), level),

        Commands::Publish { registry, token } => {
            commands::cmd_publish(pm, registry.as_deref(), token.as_deref())
        }

        Commands::Metadata { archive } => commands::cmd_metadata(pm, &archive),

        Commands::Config(_) | Commands::Repo(_) | Commands::Completions { .. } => Ok(()),
    }
}
