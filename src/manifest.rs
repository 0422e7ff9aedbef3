// src/manifest.rs

//! Package manifests and the metadata block embedded in archives
//!
//! A package is described by a [`PackageManifest`] (`criage.yaml` in the
//! project root) and optionally a [`BuildManifest`] (`build.json`). Built
//! archives carry both inside a [`PackageMetadata`] block so that installers
//! and the repository index can read them without unpacking the payload.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File name of the package manifest inside a project or archive
pub const MANIFEST_FILE: &str = "criage.yaml";

/// File name of the optional build manifest
pub const BUILD_MANIFEST_FILE: &str = "build.json";

/// Compression level presets
pub const COMPRESSION_FAST: i32 = 1;
pub const COMPRESSION_NORMAL: i32 = 3;
pub const COMPRESSION_BEST: i32 = 9;

/// Lifecycle hooks, each a list of shell commands run in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageHooks {
    pub pre_install: Vec<String>,
    pub post_install: Vec<String>,
    pub pre_remove: Vec<String>,
    pub post_remove: Vec<String>,
    pub pre_update: Vec<String>,
    pub post_update: Vec<String>,
}

/// Declarative package description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub license: String,
    pub homepage: String,
    pub repository: String,
    pub keywords: Vec<String>,
    /// Runtime dependencies: name -> version range (never resolved)
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub scripts: BTreeMap<String, String>,
    /// Globs of files to package and install
    pub files: Vec<String>,
    pub exclude: Vec<String>,
    pub arch: Vec<String>,
    pub os: Vec<String>,
    pub min_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<PackageHooks>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    /// Minimal manifest carrying only identity
    pub fn new_minimal(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Manifest written by `criage create`
    pub fn scaffold(name: &str, author: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: description.to_string(),
            author: author.to_string(),
            license: "MIT".to_string(),
            files: vec!["*".to_string()],
            exclude: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "*.log".to_string(),
            ],
            arch: vec!["amd64".to_string(), "arm64".to_string()],
            os: vec![
                "linux".to_string(),
                "darwin".to_string(),
                "windows".to_string(),
            ],
            min_version: "1.0.0".to_string(),
            ..Default::default()
        }
    }

    /// Parse a manifest from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load `criage.yaml` from a directory
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "manifest {} not found",
                path.display()
            )));
        }
        Self::parse(&fs::read_to_string(&path)?)
    }

    /// Write `criage.yaml` into a directory
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        fs::write(dir.join(MANIFEST_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Check the fields a build needs
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidManifest("package name is empty".to_string()));
        }
        if self.name.contains('/') || self.name.contains('\\') || self.name.starts_with('.') {
            return Err(Error::InvalidManifest(format!(
                "package name '{}' is not a valid directory name",
                self.name
            )));
        }
        semver::Version::parse(&self.version).map_err(|e| {
            Error::InvalidManifest(format!("version '{}' is not semver: {}", self.version, e))
        })?;
        Ok(())
    }

    /// Hooks, or an empty set
    pub fn hooks(&self) -> PackageHooks {
        self.hooks.clone().unwrap_or_default()
    }
}

/// Compression settings shared by the build manifest and client config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub format: String,
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            format: "tar.zst".to_string(),
            level: COMPRESSION_NORMAL,
        }
    }
}

/// An OS/architecture pair using Go-style names (`linux`/`amd64`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildTarget {
    pub os: String,
    pub arch: String,
}

impl BuildTarget {
    /// The platform this process runs on
    pub fn host() -> Self {
        Self {
            os: host_os().to_string(),
            arch: host_arch().to_string(),
        }
    }
}

/// Map the Rust OS name to the naming used in package files
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Map the Rust architecture name to the naming used in package files
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Build-time configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildManifest {
    pub name: String,
    pub version: String,
    pub build_script: String,
    pub build_env: BTreeMap<String, String>,
    pub output_dir: String,
    pub include_files: Vec<String>,
    pub exclude_files: Vec<String>,
    pub compression: CompressionConfig,
    pub targets: Vec<BuildTarget>,
    pub dependencies: Vec<String>,
    pub test_command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_hooks: Option<PackageHooks>,
}

impl BuildManifest {
    /// Build manifest derived from a package manifest when `build.json` is absent
    pub fn synthesize(manifest: &PackageManifest, format: &str, level: i32) -> Self {
        Self {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            build_script: "make".to_string(),
            output_dir: "./build".to_string(),
            include_files: manifest.files.clone(),
            exclude_files: manifest.exclude.clone(),
            compression: CompressionConfig {
                format: format.to_string(),
                level,
            },
            targets: vec![BuildTarget::host()],
            ..Default::default()
        }
    }

    /// Load `build.json` from a directory, `None` when absent
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(BUILD_MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Write `build.json` into a directory
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(dir.join(BUILD_MANIFEST_FILE), data)?;
        Ok(())
    }
}

/// Metadata block embedded inside a built archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub package_manifest: PackageManifest,
    #[serde(default)]
    pub build_manifest: BuildManifest,
    #[serde(default)]
    pub compression_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl PackageMetadata {
    /// Fresh metadata for a build; the archive layer stamps the remaining fields
    pub fn new(package_manifest: PackageManifest, build_manifest: BuildManifest) -> Self {
        Self {
            package_manifest,
            build_manifest,
            compression_type: String::new(),
            created_at: Utc::now(),
            created_by: String::new(),
            checksum: None,
        }
    }

    /// Metadata for an archive that carries none, identity only
    pub fn synthesized(name: &str, version: &str) -> Self {
        let build = BuildManifest {
            name: name.to_string(),
            version: version.to_string(),
            ..Default::default()
        };
        Self::new(PackageManifest::new_minimal(name, version), build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_yaml() {
        let yaml = r#"
name: hello
version: 1.2.3
description: says hello
keywords: [greeting, demo]
dependencies:
  libfoo: "^1.0"
hooks:
  post_install:
    - echo done
metadata:
  homepage_rank: 3
"#;
        let manifest = PackageManifest::parse(yaml).unwrap();
        assert_eq!(manifest.name, "hello");
        assert_eq!(manifest.dependencies.get("libfoo").unwrap(), "^1.0");
        assert_eq!(manifest.hooks().post_install, vec!["echo done"]);
        assert!(manifest.hooks().pre_install.is_empty());
        assert_eq!(manifest.metadata["homepage_rank"], serde_json::json!(3));
        manifest.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_version() {
        let manifest = PackageManifest::new_minimal("pkg", "one");
        assert!(matches!(
            manifest.validate(),
            Err(Error::InvalidManifest(_))
        ));

        let manifest = PackageManifest::new_minimal("", "1.0.0");
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_manifest_dir_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = PackageManifest::scaffold("tool", "Ann", "a tool");
        manifest.save_to_dir(dir.path()).unwrap();

        let loaded = PackageManifest::load_from_dir(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_missing_build_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BuildManifest::load_from_dir(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_synthesized_build_manifest() {
        let mut manifest = PackageManifest::new_minimal("pkg", "0.1.0");
        manifest.files = vec!["bin/*".to_string()];
        let build = BuildManifest::synthesize(&manifest, "tar.xz", 9);

        assert_eq!(build.build_script, "make");
        assert_eq!(build.output_dir, "./build");
        assert_eq!(build.include_files, vec!["bin/*"]);
        assert_eq!(build.compression.format, "tar.xz");
        assert_eq!(build.targets, vec![BuildTarget::host()]);
    }
}
