// src/bin/criage-repo.rs
//! criage-repo - package repository server
//! Usage: criage-repo [--config config.json] [--port 8080]

use anyhow::{Context, Result};
use clap::Parser;
use criage::server::{ServerConfig, run_server};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "criage-repo")]
#[command(version)]
#[command(about = "criage package repository server", long_about = None)]
struct Cli {
    /// Server config file, created with defaults when missing
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load_or_create(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    run_server(config).await
}
