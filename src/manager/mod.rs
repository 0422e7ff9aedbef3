// src/manager/mod.rs

//! Package lifecycle manager
//!
//! [`PackageManager`] is constructed once per process and owns everything a
//! command needs: the configuration, the installed-package registry, the
//! archive engine and the [`PackageSource`] packages are fetched through.
//!
//! Install, uninstall and update live in [`install`]; build and publish in
//! [`build`].

mod build;
mod install;

pub use build::BuildOptions;
pub use install::{InstallOptions, InstallOutcome, InstallStatus, RemoveOutcome, UpdateOutcome};

use crate::archive::{ArchiveManager, ArchiveOptions};
use crate::config::ConfigManager;
use crate::error::{Error, Result};
use crate::manifest::{MANIFEST_FILE, PackageManifest, PackageMetadata, host_arch, host_os};
use crate::registry::{PackageInfo, Registry, Scope};
use crate::repository::{HttpSource, PackageSource, RemotePackage, SearchResult};
use crate::scriptlet::DEFAULT_HOOK_TIMEOUT;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The only built-in project template
pub const TEMPLATE_BASIC: &str = "basic";

/// Search results merged across repositories
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// One line per repository that could not be queried
    pub warnings: Vec<String>,
}

pub struct PackageManager {
    config: ConfigManager,
    source: Box<dyn PackageSource>,
    registry: Registry,
    archives: ArchiveManager,
    hook_timeout: Duration,
}

impl PackageManager {
    /// Wire a manager from a loaded config and a package source
    ///
    /// Creates the cache, temp and local install directories and rebuilds
    /// the registry from the install roots.
    pub fn new(config: ConfigManager, source: Box<dyn PackageSource>) -> Result<Self> {
        config.ensure_directories()?;

        let registry = Registry::load(&[
            (Scope::Local, config.install_root(Scope::Local)),
            (Scope::Global, config.install_root(Scope::Global)),
        ]);
        debug!("Registry holds {} installed packages", registry.len());

        let archives = ArchiveManager::new(ArchiveOptions {
            level: config.config().compression.level,
            ..ArchiveOptions::default()
        });

        Ok(Self {
            config,
            source,
            registry,
            archives,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        })
    }

    /// Load the config (default location unless given) and talk HTTP
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => ConfigManager::default_path()?,
        };
        let config = ConfigManager::load_or_init(&path)?;
        let source = HttpSource::new(Duration::from_secs(config.config().timeout.max(1)))?;
        Self::new(config, Box::new(source))
    }

    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigManager {
        &mut self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn archives(&self) -> &ArchiveManager {
        &self.archives
    }

    /// Installed packages sorted by name
    ///
    /// With `outdated`, only packages for which some repository reports a
    /// different latest version are kept.
    pub fn list(&self, scope: Option<Scope>, outdated: bool) -> Vec<PackageInfo> {
        let packages = self.registry.list(scope);
        if !outdated {
            return packages;
        }

        packages
            .into_iter()
            .filter(|info| match self.latest_version(&info.name) {
                Ok(latest) => latest != info.version,
                Err(e) => {
                    debug!("Skipping {} in outdated check: {}", info.name, e);
                    false
                }
            })
            .collect()
    }

    /// Record of an installed package, local scope first
    pub fn info(&self, name: &str) -> Result<PackageInfo> {
        self.registry
            .find(name)
            .ok_or_else(|| Error::NotFound(format!("package {name} is not installed")))
    }

    /// Query every enabled repository and merge by descending score
    pub fn search(&self, query: &str) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();

        for repo in self.config.config().enabled_repositories() {
            match self.source.search(&repo, query) {
                Ok(results) => {
                    debug!("{} results from {}", results.len(), repo.name);
                    outcome.results.extend(results);
                }
                Err(e) => {
                    warn!("Search in repository {} failed: {}", repo.name, e);
                    outcome
                        .warnings
                        .push(format!("repository {} unavailable: {}", repo.name, e));
                }
            }
        }

        outcome
            .results
            .sort_by(|a, b| b.score.total_cmp(&a.score));
        outcome
    }

    /// Scaffold a new package project at `<parent>/<name>`
    pub fn create(
        &self,
        parent: &Path,
        name: &str,
        template: &str,
        author: &str,
        description: &str,
    ) -> Result<PathBuf> {
        if template != TEMPLATE_BASIC {
            return Err(Error::Config(format!("unknown template: {template}")));
        }

        let manifest = PackageManifest::scaffold(name, author, description);
        manifest.validate()?;

        let dir = parent.join(name);
        if dir.join(MANIFEST_FILE).exists() {
            return Err(Error::Config(format!(
                "{} already exists in {}",
                MANIFEST_FILE,
                dir.display()
            )));
        }

        fs::create_dir_all(&dir)?;
        manifest.save_to_dir(&dir)?;
        fs::write(dir.join("README.md"), readme(&manifest))?;
        for sub in ["src", "bin", "docs"] {
            fs::create_dir_all(dir.join(sub))?;
        }

        info!("Created package {} in {}", name, dir.display());
        Ok(dir)
    }

    /// Embedded metadata of an arbitrary archive file
    pub fn inspect_archive(&self, path: &Path) -> Result<PackageMetadata> {
        self.archives.inspect(path)
    }

    /// Release pooled codec contexts
    pub fn close(&self) {
        self.archives.close();
    }

    /// Latest version any repository offers for the host platform
    fn latest_version(&self, name: &str) -> Result<String> {
        self.locate(name, None, host_os(), host_arch())
            .map(|remote| remote.version)
    }

    /// First repository, by descending priority, that has the package
    fn locate(
        &self,
        name: &str,
        version: Option<&str>,
        os: &str,
        arch: &str,
    ) -> Result<RemotePackage> {
        let mut last_error = None;

        for repo in self.config.config().enabled_repositories() {
            match self.source.find(&repo, name, version, os, arch) {
                Ok(found) => {
                    debug!("Found {} {} in {}", found.name, found.version, repo.name);
                    return Ok(found);
                }
                Err(e) if e.is_not_found() => {
                    debug!("{} not in {}: {}", name, repo.name, e);
                }
                Err(e) => {
                    warn!("Repository {} failed: {}", repo.name, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::NotFound(format!("package {name} not found in any repository"))
        }))
    }
}

fn readme(manifest: &PackageManifest) -> String {
    format!(
        "# {}\n\n{}\n\n## Installation\n\n```bash\ncriage install {}\n```\n",
        manifest.name, manifest.description, manifest.name
    )
}
