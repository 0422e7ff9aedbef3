// src/registry.rs

//! Installed-package registry
//!
//! One [`PackageInfo`] per (scope, name), kept in memory behind a
//! reader/writer lock and persisted as `<install_path>/.criage/package.json`.
//! There is no central database: scanning the install roots rebuilds the
//! registry from those sidecar files.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory holding the sidecar inside an install path
pub const RECORD_DIR: &str = ".criage";

/// Sidecar file name
pub const RECORD_FILE: &str = "package.json";

/// Install location; the same name may be installed in both
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Local,
    Global,
}

impl Scope {
    pub fn from_global(global: bool) -> Self {
        if global { Scope::Global } else { Scope::Local }
    }

    pub fn is_global(self) -> bool {
        self == Scope::Global
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Local => "local",
            Scope::Global => "global",
        })
    }
}

/// Record of one installed package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub install_date: DateTime<Utc>,
    pub install_path: PathBuf,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Installed size in bytes
    #[serde(default)]
    pub size: u64,
    /// Installed files, relative to `install_path`
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

impl PackageInfo {
    pub fn scope(&self) -> Scope {
        Scope::from_global(self.global)
    }

    /// Location of the sidecar for an install path
    pub fn record_path(install_path: &Path) -> PathBuf {
        install_path.join(RECORD_DIR).join(RECORD_FILE)
    }

    /// Read a sidecar file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write the sidecar atomically (temp file + rename)
    pub fn save(&self) -> Result<()> {
        let path = Self::record_path(&self.install_path);
        let dir = path
            .parent()
            .ok_or_else(|| Error::Config(format!("bad record path {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(self)?)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Concurrency-safe map of installed packages
#[derive(Debug, Default)]
pub struct Registry {
    packages: RwLock<BTreeMap<(Scope, String), PackageInfo>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<root>/*/.criage/package.json` under the given roots
    pub fn load(roots: &[(Scope, PathBuf)]) -> Self {
        let registry = Self::new();
        for (scope, root) in roots {
            if let Err(e) = registry.scan_root(root, *scope) {
                warn!("Failed to load {} packages from {}: {}", scope, root.display(), e);
            }
        }
        registry
    }

    /// Add the records found directly under `root`, returns how many
    pub fn scan_root(&self, root: &Path, scope: Scope) -> Result<usize> {
        if !root.is_dir() {
            return Ok(0);
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            // Dot directories are staging areas of unfinished installs
            if !entry.file_type()?.is_dir() || entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let record = PackageInfo::record_path(&entry.path());
            if !record.is_file() {
                continue;
            }
            match PackageInfo::load(&record) {
                Ok(mut info) => {
                    info.global = scope.is_global();
                    found.push(info);
                }
                Err(e) => warn!("Skipping unreadable record {}: {}", record.display(), e),
            }
        }

        let count = found.len();
        let mut packages = self.packages.write();
        for info in found {
            packages.insert((scope, info.name.clone()), info);
        }
        debug!("Loaded {} {} packages from {}", count, scope, root.display());
        Ok(count)
    }

    pub fn get(&self, scope: Scope, name: &str) -> Option<PackageInfo> {
        self.packages.read().get(&(scope, name.to_string())).cloned()
    }

    /// Look a name up in the local scope, then the global one
    pub fn find(&self, name: &str) -> Option<PackageInfo> {
        self.get(Scope::Local, name)
            .or_else(|| self.get(Scope::Global, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Records sorted by name, optionally limited to one scope
    pub fn list(&self, scope: Option<Scope>) -> Vec<PackageInfo> {
        let packages = self.packages.read();
        let mut list: Vec<PackageInfo> = packages
            .values()
            .filter(|info| scope.is_none_or(|s| info.scope() == s))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then(a.global.cmp(&b.global)));
        list
    }

    /// Persist a record and make it visible
    pub fn record(&self, info: PackageInfo) -> Result<()> {
        let mut packages = self.packages.write();
        info.save()?;
        packages.insert((info.scope(), info.name.clone()), info);
        Ok(())
    }

    /// Drop a record and its sidecar, returning it if it existed
    pub fn remove(&self, scope: Scope, name: &str) -> Result<Option<PackageInfo>> {
        let mut packages = self.packages.write();
        let Some(info) = packages.remove(&(scope, name.to_string())) else {
            return Ok(None);
        };
        match fs::remove_file(PackageInfo::record_path(&info.install_path)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                packages.insert((scope, name.to_string()), info);
                return Err(e.into());
            }
        }
        Ok(Some(info))
    }

    pub fn len(&self) -> usize {
        self.packages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.read().is_empty()
    }
}
