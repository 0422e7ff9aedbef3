// src/manager/build.rs

//! Building a package archive from a project directory, and publishing it

use super::PackageManager;
use crate::archive::ArchiveFormat;
use crate::error::{Error, Result};
use crate::manifest::{BuildManifest, COMPRESSION_NORMAL, PackageManifest, PackageMetadata};
use crate::registry::RECORD_DIR;
use crate::scriptlet::{CommandRunner, DEFAULT_BUILD_TIMEOUT};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Makefile names `make` picks up on its own
const MAKEFILES: [&str; 3] = ["GNUmakefile", "makefile", "Makefile"];

/// Options for [`PackageManager::build`]
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Archive path, `<project>/<name>-<version><suffix>` when `None`
    pub output: Option<PathBuf>,
    /// Format, else the build manifest's, else the configured default
    pub format: Option<ArchiveFormat>,
    /// Compression level, resolved the same way as `format`
    pub level: Option<i32>,
}

impl PackageManager {
    /// Run the build script and pack the project into an archive
    ///
    /// Returns the path of the written archive.
    pub fn build(&self, project_dir: &Path, options: &BuildOptions) -> Result<PathBuf> {
        let manifest = PackageManifest::load_from_dir(project_dir)?;
        manifest.validate()?;

        let configured = &self.config.config().compression;
        let (build_manifest, synthesized) = match BuildManifest::load_from_dir(project_dir)? {
            Some(build) => (build, false),
            None => {
                let format = options
                    .format
                    .map(|f| f.name().to_string())
                    .unwrap_or_else(|| configured.format.clone());
                let level = options.level.unwrap_or(configured.level);
                (BuildManifest::synthesize(&manifest, &format, level), true)
            }
        };

        let format = match options.format {
            Some(format) => format,
            None => build_manifest
                .compression
                .format
                .parse()
                .or_else(|_| configured.format.parse())?,
        };
        let level = options.level.unwrap_or(build_manifest.compression.level);

        self.run_build_script(project_dir, &manifest, &build_manifest, synthesized)?;

        let output = match &options.output {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => project_dir.join(path),
            None => project_dir.join(format!(
                "{}-{}{}",
                manifest.name,
                manifest.version,
                format.suffix()
            )),
        };

        let includes = if build_manifest.include_files.is_empty() {
            manifest.files.clone()
        } else {
            build_manifest.include_files.clone()
        };
        let mut excludes = if build_manifest.exclude_files.is_empty() {
            manifest.exclude.clone()
        } else {
            build_manifest.exclude_files.clone()
        };
        excludes.push(RECORD_DIR.to_string());

        let mut metadata = PackageMetadata::new(manifest.clone(), build_manifest);
        self.archives.create_archive_with_metadata(
            project_dir,
            &output,
            format,
            level,
            &includes,
            &excludes,
            &mut metadata,
        )?;

        info!(
            "Built {} {} into {}",
            manifest.name,
            manifest.version,
            output.display()
        );
        Ok(output)
    }

    fn run_build_script(
        &self,
        project_dir: &Path,
        manifest: &PackageManifest,
        build: &BuildManifest,
        synthesized: bool,
    ) -> Result<()> {
        if build.build_script.trim().is_empty() {
            return Ok(());
        }
        if synthesized && !MAKEFILES.iter().any(|m| project_dir.join(m).is_file()) {
            debug!("No build.json and no Makefile, skipping build step");
            return Ok(());
        }

        let runner = CommandRunner::for_package(&manifest.name, &manifest.version, project_dir)
            .with_env(&build.build_env)
            .with_timeout(DEFAULT_BUILD_TIMEOUT);
        runner.run("build", &build.build_script, project_dir)
    }

    /// Build a `.tar.zst` archive and upload it to a repository
    ///
    /// Without `registry_url` the highest-priority enabled repository is
    /// used, with its token when `token` is not given.
    pub fn publish(
        &self,
        project_dir: &Path,
        registry_url: Option<&str>,
        token: Option<&str>,
    ) -> Result<PathBuf> {
        let manifest = PackageManifest::load_from_dir(project_dir)?;
        manifest.validate()?;

        let (url, token) = match registry_url {
            Some(url) => (url.to_string(), token.map(str::to_string)),
            None => {
                let repo = self
                    .config
                    .config()
                    .enabled_repositories()
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::Config("no enabled repository to publish to".to_string()))?;
                let token = token.map(str::to_string).or(repo.auth_token);
                (repo.url, token)
            }
        };

        let temp_root = self.config.temp_dir();
        fs::create_dir_all(&temp_root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("publish_{}_", manifest.name))
            .tempdir_in(&temp_root)?;
        let archive_name = format!(
            "{}-{}{}",
            manifest.name,
            manifest.version,
            ArchiveFormat::TarZst.suffix()
        );

        let archive = self.build(
            project_dir,
            &BuildOptions {
                output: Some(staging.path().join(&archive_name)),
                format: Some(ArchiveFormat::TarZst),
                level: Some(COMPRESSION_NORMAL),
            },
        )?;

        let uploaded = self.source.upload(
            &url,
            token.as_deref(),
            &archive,
            &manifest.name,
            &manifest.version,
        );
        let _ = fs::remove_file(&archive);
        uploaded?;

        info!("Published {} {} to {}", manifest.name, manifest.version, url);
        Ok(PathBuf::from(archive_name))
    }
}
