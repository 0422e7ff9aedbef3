// src/manager/install.rs

//! Install, uninstall and update
//!
//! An install walks fetch → verify → unpack → dependencies → pre_install →
//! place → record → post_install. Everything up to and including
//! `pre_install` aborts the install without touching the registry; once
//! the record is written, later failures only produce warnings.

use super::PackageManager;
use crate::archive::{ArchiveFormat, ExcludeSet, select_entries};
use crate::error::{Error, Result};
use crate::hash::verify_file_sha256;
use crate::manifest::{PackageManifest, host_arch, host_os};
use crate::registry::{PackageInfo, RECORD_DIR, Scope};
use crate::scriptlet::CommandRunner;
use chrono::Utc;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Options for [`PackageManager::install`]
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Exact version to install, latest when `None`
    pub version: Option<String>,
    pub scope: Scope,
    /// Reinstall even when already present, wiping the old install
    pub force: bool,
    /// Also install dev dependencies
    pub dev: bool,
    /// Target architecture, host when `None`
    pub arch: Option<String>,
    /// Target OS, host when `None`
    pub os: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    AlreadyInstalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub name: String,
    pub version: String,
    pub scope: Scope,
    pub status: InstallStatus,
    /// Advisory failures (post_install hooks, dependency warnings)
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { version: String },
    Updated {
        from: String,
        to: String,
        warnings: Vec<String>,
    },
}

/// A downloaded (or cached) archive ready to unpack
struct FetchedArchive {
    path: PathBuf,
    version: String,
    format: ArchiveFormat,
}

impl PackageManager {
    /// Install a package and its dependency closure
    pub fn install(&self, name: &str, options: &InstallOptions) -> Result<InstallOutcome> {
        let mut chain = Vec::new();
        self.install_in_chain(name, options, &mut chain)
    }

    fn install_in_chain(
        &self,
        name: &str,
        options: &InstallOptions,
        chain: &mut Vec<String>,
    ) -> Result<InstallOutcome> {
        if chain.iter().any(|n| n == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(Error::Dependency(format!(
                "dependency cycle: {}",
                cycle.join(" -> ")
            )));
        }

        if !options.force {
            if let Some(existing) = self.registry.get(options.scope, name) {
                let satisfied = options
                    .version
                    .as_deref()
                    .is_none_or(|wanted| wanted == existing.version);
                if satisfied {
                    info!("{} {} is already installed", name, existing.version);
                    return Ok(InstallOutcome {
                        name: name.to_string(),
                        version: existing.version,
                        scope: options.scope,
                        status: InstallStatus::AlreadyInstalled,
                        warnings: Vec::new(),
                    });
                }
            }
        }

        let os = options.os.clone().unwrap_or_else(|| host_os().to_string());
        let arch = options.arch.clone().unwrap_or_else(|| host_arch().to_string());
        info!("Installing {} for {}/{}", name, os, arch);

        let fetched = self.fetch(name, options.version.as_deref(), &os, &arch)?;

        let temp_root = self.config.temp_dir();
        fs::create_dir_all(&temp_root)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("install_{name}_"))
            .tempdir_in(&temp_root)?;

        self.archives
            .extract_archive(&fetched.path, scratch.path(), fetched.format)?;
        let manifest = self.unpacked_manifest(scratch.path(), &fetched)?;
        let version = if manifest.version.is_empty() {
            fetched.version.clone()
        } else {
            manifest.version.clone()
        };

        let mut warnings = Vec::new();

        chain.push(name.to_string());
        let deps = self.install_dependencies(name, &manifest, options.dev, chain);
        chain.pop();
        warnings.extend(deps?);

        let install_path = self.config.install_path(name, options.scope);
        let hooks = manifest.hooks();
        let runner = CommandRunner::for_package(name, &version, &install_path)
            .with_timeout(self.hook_timeout);

        runner.run_all("pre_install", &hooks.pre_install, scratch.path())?;

        let install_root = self.config.install_root(options.scope);
        fs::create_dir_all(&install_root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{name}-staging-"))
            .tempdir_in(&install_root)?;
        let files = copy_declared_files(scratch.path(), staging.path(), &manifest.files)?;
        manifest.save_to_dir(&staging.path().join(RECORD_DIR))?;
        let size = dir_size(staging.path());

        let info = PackageInfo {
            name: name.to_string(),
            version: version.clone(),
            description: manifest.description.clone(),
            author: manifest.author.clone(),
            install_date: Utc::now(),
            install_path: install_path.clone(),
            global: options.scope.is_global(),
            dependencies: manifest.dependencies.clone(),
            size,
            files,
            scripts: manifest.scripts.clone(),
        };
        self.commit_install(staging, &install_root, info)?;

        if let Err(e) = runner.run_all("post_install", &hooks.post_install, &install_path) {
            warn!("post_install hooks for {} failed: {}", name, e);
            warnings.push(format!("post_install hooks for {name} failed: {e}"));
        }

        info!("Installed {} {} into {}", name, version, install_path.display());
        Ok(InstallOutcome {
            name: name.to_string(),
            version,
            scope: options.scope,
            status: InstallStatus::Installed,
            warnings,
        })
    }

    /// Swap a fully staged tree into its install path and record it
    ///
    /// A previous tree at that path is moved aside first and restored if
    /// the swap or the record fails, so the path always holds either the
    /// old install or the complete new one.
    fn commit_install(
        &self,
        staging: tempfile::TempDir,
        install_root: &Path,
        info: PackageInfo,
    ) -> Result<()> {
        let install_path = info.install_path.clone();
        let previous = if install_path.exists() {
            let backup = tempfile::Builder::new()
                .prefix(&format!(".{}-previous-", info.name))
                .tempdir_in(install_root)?;
            let aside = backup.path().join("tree");
            fs::rename(&install_path, &aside)?;
            Some((backup, aside))
        } else {
            None
        };

        let staged = staging.keep();
        let result = fs::rename(&staged, &install_path)
            .map_err(Error::from)
            .and_then(|()| self.registry.record(info));

        if let Err(e) = result {
            let _ = fs::remove_dir_all(&staged);
            let _ = fs::remove_dir_all(&install_path);
            if let Some((_, aside)) = &previous {
                if let Err(restore) = fs::rename(aside, &install_path) {
                    warn!("Failed to restore {}: {}", install_path.display(), restore);
                }
            }
            return Err(e);
        }

        if previous.is_some() {
            debug!("Replaced previous install at {}", install_path.display());
        }
        Ok(())
    }

    /// Install missing dependencies in name order, returning their warnings
    fn install_dependencies(
        &self,
        name: &str,
        manifest: &PackageManifest,
        dev: bool,
        chain: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let mut wanted: BTreeSet<&String> = manifest.dependencies.keys().collect();
        if dev {
            wanted.extend(manifest.dev_dependencies.keys());
        }

        let mut warnings = Vec::new();
        for dep in wanted {
            if self.registry.contains(dep) {
                debug!("Dependency {} already present", dep);
                continue;
            }

            info!("Installing dependency {} of {}", dep, name);
            let outcome = self
                .install_in_chain(dep, &InstallOptions::default(), chain)
                .map_err(|e| match e {
                    Error::Dependency(_) => e,
                    other => Error::Dependency(format!(
                        "failed to install {dep} required by {name}: {other}"
                    )),
                })?;
            warnings.extend(outcome.warnings);
        }
        Ok(warnings)
    }

    /// Archive for a package, from the cache when possible
    fn fetch(&self, name: &str, version: Option<&str>, os: &str, arch: &str) -> Result<FetchedArchive> {
        if let Some(version) = version {
            if let Some(cached) = self.cached_archive(name, version) {
                info!("Using cached {} {}", name, version);
                return Ok(cached);
            }
        }

        let remote = self.locate(name, version, os, arch)?;
        if let Some(cached) = self.cached_archive(name, &remote.version) {
            info!("Using cached {} {}", name, remote.version);
            return Ok(cached);
        }

        let format = ArchiveFormat::from_name(&remote.format)
            .unwrap_or_else(|| ArchiveFormat::detect(&remote.filename));
        let path = self
            .config
            .cache_path(name, &remote.version)
            .join(format!("package{}", format.suffix()));

        self.source.download(&remote, &path)?;

        if self.config.config().verify_hashes && !remote.checksum.is_empty() {
            if let Err(e) = verify_file_sha256(&path, &remote.checksum) {
                let _ = fs::remove_file(&path);
                return Err(e);
            }
            debug!("Checksum verified for {}", path.display());
        }

        Ok(FetchedArchive {
            path,
            version: remote.version,
            format,
        })
    }

    fn cached_archive(&self, name: &str, version: &str) -> Option<FetchedArchive> {
        let dir = self.config.cache_path(name, version);
        ArchiveFormat::ALL.into_iter().find_map(|format| {
            let path = dir.join(format!("package{}", format.suffix()));
            path.is_file().then(|| FetchedArchive {
                path,
                version: version.to_string(),
                format,
            })
        })
    }

    /// Manifest shipped in the archive, else the one in its metadata block
    fn unpacked_manifest(&self, scratch: &Path, fetched: &FetchedArchive) -> Result<PackageManifest> {
        match PackageManifest::load_from_dir(scratch) {
            Ok(manifest) => Ok(manifest),
            Err(e) if e.is_not_found() => {
                debug!("No manifest file in archive, reading embedded metadata");
                let metadata = self.archives.extract_metadata(&fetched.path, fetched.format)?;
                Ok(metadata.package_manifest)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove an installed package
    ///
    /// `purge` also drops the package's cached downloads.
    pub fn uninstall(&self, name: &str, scope: Scope, purge: bool) -> Result<RemoveOutcome> {
        let info = self
            .registry
            .get(scope, name)
            .ok_or_else(|| Error::NotFound(format!("package {name} is not installed ({scope})")))?;

        let mut outcome = RemoveOutcome::default();
        let manifest = match installed_manifest(&info.install_path) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Could not load manifest of {}: {}", name, e);
                outcome
                    .warnings
                    .push(format!("could not load manifest of {name}: {e}"));
                None
            }
        };
        let hooks = manifest.map(|m| m.hooks()).unwrap_or_default();
        let runner = CommandRunner::for_package(name, &info.version, &info.install_path)
            .with_timeout(self.hook_timeout);

        if let Err(e) = runner.run_all("pre_remove", &hooks.pre_remove, &info.install_path) {
            warn!("pre_remove hooks for {} failed: {}", name, e);
            outcome
                .warnings
                .push(format!("pre_remove hooks for {name} failed: {e}"));
        }

        match fs::remove_dir_all(&info.install_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.registry.remove(scope, name)?;

        if purge {
            let cache = self.config.cache_path(name, "");
            if cache.exists() {
                fs::remove_dir_all(&cache)?;
                debug!("Purged cache {}", cache.display());
            }
        }

        let cwd = self.config.install_root(scope);
        let cwd = if cwd.is_dir() { cwd } else { self.config.temp_dir() };
        if let Err(e) = runner.run_all("post_remove", &hooks.post_remove, &cwd) {
            warn!("post_remove hooks for {} failed: {}", name, e);
            outcome
                .warnings
                .push(format!("post_remove hooks for {name} failed: {e}"));
        }

        info!("Removed {} {}", name, info.version);
        Ok(outcome)
    }

    /// Reinstall a package at the latest version for the host platform
    pub fn update(&self, name: &str) -> Result<UpdateOutcome> {
        let installed = self.info(name)?;
        self.update_in(name, installed.scope())
    }

    /// Update the copy of `name` installed in `scope`
    fn update_in(&self, name: &str, scope: Scope) -> Result<UpdateOutcome> {
        let installed = self.registry.get(scope, name).ok_or_else(|| {
            Error::NotFound(format!("package {name} is not installed ({scope})"))
        })?;
        let latest = self.latest_version(name)?;

        if latest == installed.version {
            info!("{} is up to date ({})", name, latest);
            return Ok(UpdateOutcome::UpToDate { version: latest });
        }

        let mut warnings = Vec::new();
        let old_hooks = installed_manifest(&installed.install_path)
            .map(|m| m.hooks())
            .unwrap_or_default();
        let old_runner =
            CommandRunner::for_package(name, &installed.version, &installed.install_path)
                .with_timeout(self.hook_timeout);
        if let Err(e) = old_runner.run_all("pre_update", &old_hooks.pre_update, &installed.install_path) {
            warn!("pre_update hooks for {} failed: {}", name, e);
            warnings.push(format!("pre_update hooks for {name} failed: {e}"));
        }

        let outcome = self.install(
            name,
            &InstallOptions {
                version: Some(latest.clone()),
                scope: installed.scope(),
                force: true,
                ..InstallOptions::default()
            },
        )?;
        warnings.extend(outcome.warnings);

        let new_path = self.config.install_path(name, installed.scope());
        let new_hooks = installed_manifest(&new_path)
            .map(|m| m.hooks())
            .unwrap_or_default();
        let new_runner = CommandRunner::for_package(name, &outcome.version, &new_path)
            .with_timeout(self.hook_timeout);
        if let Err(e) = new_runner.run_all("post_update", &new_hooks.post_update, &new_path) {
            warn!("post_update hooks for {} failed: {}", name, e);
            warnings.push(format!("post_update hooks for {name} failed: {e}"));
        }

        Ok(UpdateOutcome::Updated {
            from: installed.version,
            to: outcome.version,
            warnings,
        })
    }

    /// Update every installed package in each scope it lives in
    pub fn update_all(&self) -> Vec<(Scope, String, Result<UpdateOutcome>)> {
        self.registry
            .list(None)
            .into_iter()
            .map(|installed| {
                let scope = installed.scope();
                let result = self.update_in(&installed.name, scope);
                if let Err(e) = &result {
                    warn!("Failed to update {} ({}): {}", installed.name, scope, e);
                }
                (scope, installed.name, result)
            })
            .collect()
    }
}

/// Manifest saved at install time, falling back to a shipped `criage.yaml`
fn installed_manifest(install_path: &Path) -> Result<PackageManifest> {
    match PackageManifest::load_from_dir(&install_path.join(RECORD_DIR)) {
        Ok(manifest) => Ok(manifest),
        Err(e) if e.is_not_found() => PackageManifest::load_from_dir(install_path),
        Err(e) => Err(e),
    }
}

/// Copy the declared file globs from `src` into `dest`
///
/// Returns the copied regular files relative to `dest`. A plain path that
/// is absent from `src` is an error; a glob may match nothing.
fn copy_declared_files(src: &Path, dest: &Path, patterns: &[String]) -> Result<Vec<String>> {
    if let Some(missing) = patterns.iter().find(|p| {
        !p.contains(['*', '?', '[']) && !src.join(p.trim_start_matches("./")).exists()
    }) {
        return Err(Error::NotFound(format!("declared file {missing} is not in the package")));
    }

    let entries = select_entries(src, patterns, &ExcludeSet::new(&[]))?;
    let mut files = Vec::new();

    for entry in entries {
        let target = dest.join(&entry.name);
        if entry.is_dir {
            fs::create_dir_all(&target)?;
            fs::set_permissions(&target, fs::metadata(&entry.path)?.permissions())?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&entry.path, &target)?;
        files.push(entry.name);
    }

    debug!("Copied {} files into {}", files.len(), dest.display());
    Ok(files)
}

/// Total size of the regular files under `dir`
fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_declared_files_globs() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("bin")).unwrap();
        fs::write(src.path().join("bin/tool"), b"#!/bin/sh\n").unwrap();
        fs::write(src.path().join("README.md"), b"readme").unwrap();
        fs::write(src.path().join("notes.log"), b"log").unwrap();

        let files = copy_declared_files(
            src.path(),
            dest.path(),
            &["bin".to_string(), "*.md".to_string()],
        )
        .unwrap();

        assert_eq!(files, vec!["README.md".to_string(), "bin/tool".to_string()]);
        assert!(dest.path().join("bin/tool").exists());
        assert!(!dest.path().join("notes.log").exists());
    }

    #[test]
    fn test_copy_rejects_missing_declared_path() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("present.txt"), b"x").unwrap();

        let err = copy_declared_files(
            src.path(),
            dest.path(),
            &["present.txt".to_string(), "absent.txt".to_string()],
        )
        .unwrap_err();
        assert!(err.is_not_found());
        assert!(!dest.path().join("present.txt").exists());

        let files =
            copy_declared_files(src.path(), dest.path(), &["*.md".to_string()]).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_copy_everything_when_no_patterns() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/c.txt"), b"c").unwrap();

        let files = copy_declared_files(src.path(), dest.path(), &[]).unwrap();
        assert_eq!(files, vec!["a/b/c.txt".to_string()]);
        assert_eq!(dir_size(dest.path()), 1);
    }
}
