// src/cli/mod.rs
//! CLI definitions for the criage package manager
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Package commands sit at the root (`install`, `uninstall`, `update`,
//! `search`, `list`, `info`); authoring commands (`create`, `build`,
//! `publish`, `metadata`) next to them; settings live under `config` and
//! `repo`.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod config;
mod repo;

pub use config::ConfigCommands;
pub use repo::RepoCommands;

#[derive(Parser)]
#[command(name = "criage")]
#[command(author = "Criage Contributors")]
#[command(version)]
#[command(about = "Package manager with self-describing compressed archives", long_about = None)]
pub struct Cli {
    /// Config file (default: $CRIAGE_CONFIG or ~/.config/criage/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a package from the configured repositories
    Install {
        /// Package name
        package: String,

        /// Install into the global location
        #[arg(short, long)]
        global: bool,

        /// Version to install (latest when omitted)
        #[arg(short = 'v', long)]
        version: Option<String>,

        /// Reinstall even if already installed
        #[arg(short, long)]
        force: bool,

        /// Also install dev dependencies
        #[arg(short, long)]
        dev: bool,

        /// Target architecture (host when omitted)
        #[arg(short, long)]
        arch: Option<String>,

        /// Target operating system (host when omitted)
        #[arg(short, long)]
        os: Option<String>,
    },

    /// Remove an installed package
    Uninstall {
        /// Package name
        package: String,

        /// Remove from the global location
        #[arg(short, long)]
        global: bool,

        /// Also remove cached downloads
        #[arg(short, long)]
        purge: bool,
    },

    /// Update one package, or all with --all
    Update {
        /// Package name
        #[arg(required_unless_present = "all")]
        package: Option<String>,

        /// Update every installed package
        #[arg(long, conflicts_with = "package")]
        all: bool,
    },

    /// Search the configured repositories
    Search {
        /// Search text, matched against name, description, keywords and author
        query: String,
    },

    /// List installed packages
    List {
        /// Only global packages
        #[arg(short, long, conflicts_with = "all_scopes")]
        global: bool,

        /// Local and global packages
        #[arg(long)]
        all_scopes: bool,

        /// Only packages with a newer version available
        #[arg(short, long)]
        outdated: bool,
    },

    /// Show an installed package
    Info {
        /// Package name
        package: String,
    },

    /// Scaffold a new package project in ./<name>
    Create {
        /// Package name
        name: String,

        /// Project template
        #[arg(short, long, default_value = "basic")]
        template: String,

        /// Package author
        #[arg(short, long, default_value = "")]
        author: String,

        /// Package description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Build a package archive from the current directory
    Build {
        /// Output file (default: <name>-<version>.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Archive format: tar.zst, tar.lz4, tar.xz, tar.gz or zip
        #[arg(short, long)]
        format: Option<String>,

        /// Compression level (1 fast, 3 normal, 9 best)
        #[arg(short = 'c', long = "compression")]
        level: Option<i32>,
    },

    /// Build the package in the current directory and upload it
    Publish {
        /// Repository API URL (default: highest-priority repository)
        #[arg(short, long)]
        registry: Option<String>,

        /// Upload token
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Read and change client settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Manage repositories
    #[command(subcommand)]
    Repo(RepoCommands),

    /// Print the metadata embedded in an archive
    Metadata {
        /// Archive path
        archive: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
