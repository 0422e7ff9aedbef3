// src/repository/types.rs

//! JSON shapes exchanged with a criage repository server

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One platform/format specific artifact of a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub os: String,
    pub arch: String,
    pub format: String,
    pub filename: String,
    pub size: u64,
    pub checksum: String,
}

impl FileEntry {
    /// True when both entries describe the same (os, arch, format) slot
    ///
    /// A version holds at most one file per slot, whatever its file name.
    pub fn same_slot(&self, other: &FileEntry) -> bool {
        self.os == other.os && self.arch == other.arch && self.format == other.format
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub checksum: String,
    pub uploaded: DateTime<Utc>,
    #[serde(default)]
    pub downloads: u64,
}

impl VersionEntry {
    /// File built for the given platform, if any
    pub fn file_for(&self, os: &str, arch: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.os == os && f.arch == arch)
    }

    pub fn file_named(&self, filename: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.filename == filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    #[serde(default)]
    pub latest_version: String,
    #[serde(default)]
    pub downloads: u64,
    pub updated: DateTime<Utc>,
}

impl PackageEntry {
    pub fn version(&self, version: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn version_mut(&mut self, version: &str) -> Option<&mut VersionEntry> {
        self.versions.iter_mut().find(|v| v.version == version)
    }

    pub fn latest(&self) -> Option<&VersionEntry> {
        self.version(&self.latest_version)
    }
}

/// Aggregate repository statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_downloads: u64,
    pub packages_by_license: BTreeMap<String, u64>,
    pub packages_by_author: BTreeMap<String, u64>,
    pub popular_packages: Vec<String>,
}

/// The repository catalog, persisted as one JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryIndex {
    pub last_updated: DateTime<Utc>,
    pub total_packages: usize,
    pub packages: BTreeMap<String, PackageEntry>,
    #[serde(default)]
    pub statistics: Statistics,
}

impl Default for RepositoryIndex {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            total_packages: 0,
            packages: BTreeMap::new(),
            statistics: Statistics::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Name of the configured repository that answered, client side only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default)]
    pub downloads: u64,
    pub updated: DateTime<Utc>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total: usize,
}

/// Envelope wrapping every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }
}
