// src/cli/config.rs
//! Client settings commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a value (e.g. compression.level best)
    Set {
        /// Setting key
        key: String,

        /// New value
        value: String,
    },

    /// Print a single value
    Get {
        /// Setting key
        key: String,
    },

    /// Print every setting
    List,
}
