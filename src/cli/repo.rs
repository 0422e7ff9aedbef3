// src/cli/repo.rs
//! Repository management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum RepoCommands {
    /// Add a repository, replacing one with the same name
    Add {
        /// Repository name
        name: String,

        /// Repository API URL, e.g. https://packages.example.com/api/v1
        url: String,

        /// Repository priority (higher = preferred)
        #[arg(long, default_value = "50")]
        priority: i32,

        /// Repository type
        #[arg(long = "type", default_value = "http")]
        repo_type: String,
    },

    /// Remove a repository
    Remove {
        /// Repository name
        name: String,
    },

    /// List configured repositories
    List,
}
