// src/server/mod.rs
//! criage repository server
//!
//! This module provides an HTTP server that:
//! - Keeps a JSON catalog of every archive in its storage directory
//! - Answers package, version and ranked search queries
//! - Streams archives and counts downloads
//! - Accepts authenticated uploads and rescans after each one
//!
//! The catalog lives in [`IndexManager`]; every read-modify-persist cycle
//! runs under its single mutex.

mod handlers;
mod index;
mod routes;
mod search;

pub use index::{IndexManager, ParsedFilename, parse_filename};
pub use routes::create_router;
pub use search::search_packages;

use crate::archive::ArchiveFormat;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default upload body limit (100 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Server configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory holding the archives
    pub storage_path: PathBuf,
    /// Catalog file
    pub index_path: PathBuf,
    /// Bearer token required by upload and refresh
    pub upload_token: String,
    /// Largest accepted upload body in bytes
    pub max_file_size: u64,
    /// Archive suffixes (without the leading dot) the server accepts
    pub allowed_formats: Vec<String>,
    pub enable_cors: bool,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            storage_path: PathBuf::from("./packages"),
            index_path: PathBuf::from("./index.json"),
            upload_token: "your-secret-token".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_formats: ArchiveFormat::ALL
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            enable_cors: true,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Read the config file, writing the defaults there first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            return Ok(serde_json::from_str(&content)?);
        }

        tracing::info!("Creating default config at {}", path.display());
        let config = Self::default();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&config)?)?;
        Ok(config)
    }

    /// Longest allowed format suffix `filename` ends with
    pub fn matching_format(&self, filename: &str) -> Option<&str> {
        index::match_format(filename, &self.allowed_formats)
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub index: IndexManager,
}

impl ServerState {
    /// Load the catalog and scan the storage directory
    pub async fn open(config: ServerConfig) -> Result<Self> {
        let index = IndexManager::open(&config).await?;
        Ok(Self {
            config: Arc::new(config),
            index,
        })
    }
}

/// Start the repository server and serve until ctrl-c
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Storage: {}", config.storage_path.display());
    tracing::info!("Index: {}", config.index_path.display());
    tracing::info!("Allowed formats: {}", config.allowed_formats.join(", "));

    let state = ServerState::open(config).await?;
    let total = state.index.total_packages().await;
    tracing::info!("Index holds {} packages", total);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting repository server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Repository server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(path.exists());

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["port"], 8080);
        assert_eq!(written["upload_token"], "your-secret-token");
        assert_eq!(written["max_file_size"], 100 * 1024 * 1024);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"port": 9000, "enable_cors": false}"#).unwrap();

        let config = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert!(!config.enable_cors);
        assert_eq!(config.allowed_formats.len(), 5);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_matching_format_prefers_longest() {
        let config = ServerConfig {
            allowed_formats: vec!["gz".to_string(), "tar.gz".to_string()],
            ..ServerConfig::default()
        };
        assert_eq!(config.matching_format("a-1.0.tar.gz"), Some("tar.gz"));
        assert_eq!(config.matching_format("a-1.0.TAR.GZ"), Some("tar.gz"));
        assert_eq!(config.matching_format("a-1.0.rpm"), None);
    }
}
