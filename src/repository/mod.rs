// src/repository/mod.rs

//! Talking to package repositories
//!
//! This module provides:
//! - The JSON types of the repository HTTP API (shared with the server)
//! - The [`PackageSource`] seam the lifecycle manager fetches through
//! - [`HttpSource`], the reqwest-backed implementation

mod client;
mod types;

pub use client::HttpSource;
pub use types::{
    ApiResponse, FileEntry, PackageEntry, RepositoryIndex, SearchResponse, SearchResult,
    Statistics, VersionEntry,
};

use crate::config::Repository;
use crate::error::Result;
use std::path::Path;

/// A package located in a repository, ready to download
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePackage {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub filename: String,
    pub format: String,
    pub size: u64,
    /// SHA-256 of the archive, empty when the repository reports none
    pub checksum: String,
    pub download_url: String,
    /// Name of the configured repository that answered
    pub repository: String,
    pub auth_token: Option<String>,
}

impl RemotePackage {
    /// Build from an index version entry and the chosen file
    pub fn from_entry(repo: &Repository, name: &str, version: &VersionEntry, file: &FileEntry) -> Self {
        Self {
            name: name.to_string(),
            version: version.version.clone(),
            description: version.description.clone(),
            author: String::new(),
            filename: file.filename.clone(),
            format: file.format.clone(),
            size: file.size,
            checksum: file.checksum.clone(),
            download_url: format!(
                "{}/download/{}/{}/{}",
                repo.url.trim_end_matches('/'),
                name,
                version.version,
                file.filename
            ),
            repository: repo.name.clone(),
            auth_token: repo.auth_token.clone(),
        }
    }
}

/// Where the lifecycle manager finds, fetches and publishes packages
pub trait PackageSource: Send + Sync {
    /// Locate `name` (at `version`, or the latest) built for `os`/`arch`
    fn find(
        &self,
        repo: &Repository,
        name: &str,
        version: Option<&str>,
        os: &str,
        arch: &str,
    ) -> Result<RemotePackage>;

    /// Fetch the archive to `dest`
    fn download(&self, package: &RemotePackage, dest: &Path) -> Result<()>;

    /// Ranked search in one repository
    fn search(&self, repo: &Repository, query: &str) -> Result<Vec<SearchResult>>;

    /// Publish an archive to a repository's upload endpoint
    fn upload(
        &self,
        registry_url: &str,
        token: Option<&str>,
        archive: &Path,
        name: &str,
        version: &str,
    ) -> Result<()>;
}
