// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use criage::archive::{ArchiveFormat, ArchiveManager};
use criage::config::{Config, ConfigManager, Repository};
use criage::hash::sha256_file;
use criage::manager::PackageManager;
use criage::manifest::{BuildManifest, PackageHooks, PackageManifest, PackageMetadata, host_arch, host_os};
use criage::repository::{PackageSource, RemotePackage, SearchResult};
use criage::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Name of the single repository configured by [`test_manager`]
pub const TEST_REPO: &str = "local";

/// Manifest with a name, version and optional hooks
pub fn manifest(name: &str, version: &str) -> PackageManifest {
    let mut manifest = PackageManifest::new_minimal(name, version);
    manifest.description = format!("{name} test package");
    manifest.author = "Test Author".to_string();
    manifest
}

pub fn with_hooks(mut manifest: PackageManifest, hooks: PackageHooks) -> PackageManifest {
    manifest.hooks = Some(hooks);
    manifest
}

pub fn with_dependencies(mut manifest: PackageManifest, deps: &[&str]) -> PackageManifest {
    for dep in deps {
        manifest.dependencies.insert(dep.to_string(), "*".to_string());
    }
    manifest
}

/// Build `<out>/<name>-<version>.tar.zst` holding `criage.yaml` and `files`
pub fn build_package(out: &Path, manifest: &PackageManifest, files: &[(&str, &str)]) -> PathBuf {
    let project = out.join(format!("src-{}-{}", manifest.name, manifest.version));
    fs::create_dir_all(&project).unwrap();
    manifest.save_to_dir(&project).unwrap();
    for (path, content) in files {
        let target = project.join(path);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, content).unwrap();
    }

    let dest = out.join(format!(
        "{}-{}{}",
        manifest.name,
        manifest.version,
        ArchiveFormat::TarZst.suffix()
    ));
    let mut metadata = PackageMetadata::new(manifest.clone(), BuildManifest::default());
    ArchiveManager::default()
        .create_archive_with_metadata(
            &project,
            &dest,
            ArchiveFormat::TarZst,
            3,
            &[],
            &[],
            &mut metadata,
        )
        .unwrap();
    dest
}

struct Published {
    remote: RemotePackage,
    os: String,
    arch: String,
    archive: PathBuf,
}

/// A [`PackageSource`] serving archives straight from disk
///
/// Counts lookups and downloads so tests can assert on network traffic.
#[derive(Clone, Default)]
pub struct LocalSource {
    published: Arc<Mutex<Vec<Published>>>,
    pub finds: Arc<AtomicUsize>,
    pub downloads: Arc<AtomicUsize>,
}

impl LocalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an archive for the host platform; the newest publish is latest
    pub fn publish(&self, archive: &Path, name: &str, version: &str) {
        let checksum = sha256_file(archive).unwrap();
        self.publish_with_checksum(archive, name, version, &checksum);
    }

    pub fn publish_with_checksum(&self, archive: &Path, name: &str, version: &str, checksum: &str) {
        let filename = archive.file_name().unwrap().to_string_lossy().into_owned();
        let remote = RemotePackage {
            name: name.to_string(),
            version: version.to_string(),
            description: String::new(),
            author: String::new(),
            filename: filename.clone(),
            format: ArchiveFormat::detect(&filename).name().to_string(),
            size: fs::metadata(archive).unwrap().len(),
            checksum: checksum.to_string(),
            download_url: archive.to_string_lossy().into_owned(),
            repository: String::new(),
            auth_token: None,
        };
        self.published.lock().unwrap().push(Published {
            remote,
            os: host_os().to_string(),
            arch: host_arch().to_string(),
            archive: archive.to_path_buf(),
        });
    }

    pub fn find_count(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl PackageSource for LocalSource {
    fn find(
        &self,
        repo: &Repository,
        name: &str,
        version: Option<&str>,
        os: &str,
        arch: &str,
    ) -> Result<RemotePackage> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let published = self.published.lock().unwrap();
        published
            .iter()
            .rev()
            .find(|p| {
                p.remote.name == name
                    && p.os == os
                    && p.arch == arch
                    && version.is_none_or(|v| v == p.remote.version)
            })
            .map(|p| RemotePackage {
                repository: repo.name.clone(),
                ..p.remote.clone()
            })
            .ok_or_else(|| Error::NotFound(format!("{name} in {}", repo.name)))
    }

    fn download(&self, package: &RemotePackage, dest: &Path) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let archive = {
            let published = self.published.lock().unwrap();
            published
                .iter()
                .find(|p| p.remote.download_url == package.download_url)
                .map(|p| p.archive.clone())
                .ok_or_else(|| Error::NotFound(package.download_url.clone()))?
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(archive, dest)?;
        Ok(())
    }

    fn search(&self, repo: &Repository, query: &str) -> Result<Vec<SearchResult>> {
        let published = self.published.lock().unwrap();
        Ok(published
            .iter()
            .filter(|p| p.remote.name.contains(query))
            .map(|p| SearchResult {
                name: p.remote.name.clone(),
                version: p.remote.version.clone(),
                description: String::new(),
                author: String::new(),
                repository: repo.name.clone(),
                downloads: 0,
                updated: chrono::Utc::now(),
                score: 10.0,
            })
            .collect())
    }

    fn upload(&self, _: &str, _: Option<&str>, _: &Path, _: &str, _: &str) -> Result<()> {
        Err(Error::Network("uploads are not supported here".to_string()))
    }
}

/// Config whose paths all live under `root`, with one repository
pub fn test_config(root: &Path) -> Config {
    let path = |sub: &str| root.join(sub).to_string_lossy().into_owned();
    Config {
        global_path: path("global"),
        local_path: path("local"),
        cache_path: path("cache"),
        temp_path: path("tmp"),
        repositories: vec![Repository {
            name: TEST_REPO.to_string(),
            url: "http://localhost:8080/api/v1".to_string(),
            repo_type: "http".to_string(),
            priority: 100,
            enabled: true,
            auth_token: None,
            fingerprint: None,
        }],
        ..Config::default()
    }
}

/// Manager over `root` fetching through `source`
pub fn test_manager(root: &Path, source: &LocalSource) -> PackageManager {
    let config = ConfigManager::with_config(root.join("config.yaml"), test_config(root));
    PackageManager::new(config, Box::new(source.clone()))
        .unwrap()
        .with_hook_timeout(Duration::from_secs(30))
}
