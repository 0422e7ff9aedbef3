// src/archive/mod.rs
//! Archive codec layer
//!
//! Creates and extracts package archives in five formats and embeds a
//! [`PackageMetadata`] block inside the archive itself:
//!
//! - tar+zstd, tar+lz4, tar+xz, tar+gzip share the tar container
//!   (see [`tar`](self::tar)) and differ only in the compression stream
//! - zip is its own container (see [`zip`](self::zip))
//!
//! All extraction paths are checked against the destination root and fail
//! with [`Error::PathTraversal`] on the first escaping entry.

mod codec;
mod format;
pub mod path;
mod select;
mod tar;
mod zip;

pub use codec::{CodecPools, CodecSettings, DEFAULT_ZSTD_WINDOW_LOG, Pool};
pub use format::{ArchiveFormat, detect_format};
pub use select::{ExcludeSet, SelectedEntry, select_entries};

use crate::error::{Error, Result};
use crate::manifest::{COMPRESSION_NORMAL, PackageMetadata};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Name of the zero-length tar entry carrying PAX metadata records
pub const METADATA_ENTRY: &str = ".criage_metadata";

/// Name of the metadata entry inside zip archives
pub const METADATA_JSON_ENTRY: &str = ".criage_metadata.json";

/// PAX record keys
pub const PAX_METADATA: &str = "criage.metadata";
pub const PAX_VERSION: &str = "criage.version";
pub const PAX_PACKAGE_MANIFEST: &str = "criage.package_manifest";
pub const PAX_BUILD_MANIFEST: &str = "criage.build_manifest";

/// Maximum size for a single file during extraction (2 GiB)
pub const MAX_EXTRACTION_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Serialized metadata ready to be written into an archive
pub(crate) struct MetadataBlock {
    metadata_json: String,
    package_manifest_json: String,
    build_manifest_json: String,
    tool_version: String,
    created_at: DateTime<Utc>,
}

impl MetadataBlock {
    fn new(metadata: &PackageMetadata, tool_version: &str) -> Result<Self> {
        Ok(Self {
            metadata_json: serde_json::to_string(metadata)?,
            package_manifest_json: serde_json::to_string(&metadata.package_manifest)?,
            build_manifest_json: serde_json::to_string(&metadata.build_manifest)?,
            tool_version: tool_version.to_string(),
            created_at: metadata.created_at,
        })
    }
}

/// Per-container implementation of the archive operations
pub(crate) trait ArchiveBackend {
    fn create(
        &self,
        entries: &[SelectedEntry],
        dest: &Path,
        metadata: Option<&MetadataBlock>,
    ) -> Result<()>;

    fn extract(&self, src: &Path, dest: &Path) -> Result<()>;

    fn read_metadata(&self, src: &Path) -> Result<PackageMetadata>;
}

/// Tunables for an [`ArchiveManager`]
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Default compression level when a call does not pass one
    pub level: i32,
    /// zstd window size as a power of two
    pub zstd_window_log: u32,
    /// zstd worker threads, 0 for single-threaded
    pub zstd_workers: u32,
    /// Maximum zstd contexts kept per direction
    pub pool_size: usize,
    /// Tool version recorded in `created_by` and the PAX version record
    pub tool_version: String,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            level: COMPRESSION_NORMAL,
            zstd_window_log: DEFAULT_ZSTD_WINDOW_LOG,
            zstd_workers: 0,
            pool_size: 4,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Entry point for all archive operations
pub struct ArchiveManager {
    options: ArchiveOptions,
    pools: CodecPools,
}

impl ArchiveManager {
    pub fn new(options: ArchiveOptions) -> Self {
        let pools = CodecPools::new(
            CodecSettings {
                zstd_window_log: options.zstd_window_log,
                zstd_workers: options.zstd_workers,
            },
            options.pool_size,
        );
        Self { options, pools }
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// `criage/<version>`
    pub fn created_by(&self) -> String {
        format!("criage/{}", self.options.tool_version)
    }

    fn backend(&self, format: ArchiveFormat, level: i32) -> Box<dyn ArchiveBackend + '_> {
        match format {
            ArchiveFormat::Zip => Box::new(zip::ZipBackend { level }),
            _ => Box::new(tar::TarBackend {
                pools: &self.pools,
                format,
                level,
            }),
        }
    }

    /// Archive `source_dir` into `dest`
    pub fn create_archive(
        &self,
        source_dir: &Path,
        dest: &Path,
        format: ArchiveFormat,
        includes: &[String],
        excludes: &[String],
    ) -> Result<()> {
        self.create_inner(source_dir, dest, format, self.options.level, includes, excludes, None)
    }

    /// Archive `source_dir` into `dest` with an embedded metadata block
    ///
    /// Stamps `compression_type`, `created_at` and `created_by` on
    /// `metadata` before writing it.
    #[allow(clippy::too_many_arguments)]
    pub fn create_archive_with_metadata(
        &self,
        source_dir: &Path,
        dest: &Path,
        format: ArchiveFormat,
        level: i32,
        includes: &[String],
        excludes: &[String],
        metadata: &mut PackageMetadata,
    ) -> Result<()> {
        metadata.compression_type = format.name().to_string();
        metadata.created_at = Utc::now();
        metadata.created_by = self.created_by();

        let block = MetadataBlock::new(metadata, &self.options.tool_version)?;
        self.create_inner(source_dir, dest, format, level, includes, excludes, Some(&block))
    }

    #[allow(clippy::too_many_arguments)]
    fn create_inner(
        &self,
        source_dir: &Path,
        dest: &Path,
        format: ArchiveFormat,
        level: i32,
        includes: &[String],
        excludes: &[String],
        metadata: Option<&MetadataBlock>,
    ) -> Result<()> {
        if !source_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "source directory {}",
                source_dir.display()
            )));
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut exclude_set = ExcludeSet::new(excludes);
        if let Some(canonical) = canonical_target(dest) {
            exclude_set = exclude_set.with_path(canonical);
        }
        let entries = select_entries(source_dir, includes, &exclude_set)?;

        info!(
            "Creating {} archive {} ({} entries)",
            format,
            dest.display(),
            entries.len()
        );
        let result = self.backend(format, level).create(&entries, dest, metadata);
        if result.is_err() {
            let _ = fs::remove_file(dest);
        }
        result
    }

    /// Unpack `src` into `dest_dir`
    ///
    /// Files written before a failure are left in place; callers extract
    /// into scratch directories they own.
    pub fn extract_archive(&self, src: &Path, dest_dir: &Path, format: ArchiveFormat) -> Result<()> {
        debug!("Extracting {} ({}) to {}", src.display(), format, dest_dir.display());
        self.backend(format, self.options.level).extract(src, dest_dir)
    }

    /// Read the embedded metadata block
    pub fn extract_metadata(&self, src: &Path, format: ArchiveFormat) -> Result<PackageMetadata> {
        self.backend(format, self.options.level).read_metadata(src)
    }

    /// Detect the format from the file name and read the metadata block
    pub fn inspect(&self, src: &Path) -> Result<PackageMetadata> {
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.extract_metadata(src, detect_format(&name))
    }

    /// Built zstd contexts as (encoders, decoders)
    pub fn live_codec_contexts(&self) -> (usize, usize) {
        self.pools.live_contexts()
    }

    /// Release pooled codec contexts
    pub fn close(&self) {
        self.pools.close();
    }
}

impl Default for ArchiveManager {
    fn default() -> Self {
        Self::new(ArchiveOptions::default())
    }
}

fn canonical_target(dest: &Path) -> Option<std::path::PathBuf> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(dest.file_name()?))
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{BuildManifest, PackageManifest};
    use std::io::Write;

    fn source_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/run"), b"#!/bin/sh\necho hi\n").unwrap();
        fs::write(dir.path().join("empty.txt"), b"").unwrap();
        dir
    }

    #[test]
    fn test_metadata_roundtrip_each_format() {
        let manager = ArchiveManager::default();
        let src = source_tree();
        let out = tempfile::tempdir().unwrap();

        for format in ArchiveFormat::ALL {
            let mut manifest = PackageManifest::new_minimal("héllo", "1.0.0");
            manifest.description = "Unicode ✓ description".to_string();
            let mut metadata = PackageMetadata::new(manifest, BuildManifest::default());

            let dest = out.path().join(format!("pkg{}", format.suffix()));
            manager
                .create_archive_with_metadata(src.path(), &dest, format, 3, &[], &[], &mut metadata)
                .unwrap();

            assert_eq!(metadata.compression_type, format.name());
            assert_eq!(metadata.created_by, manager.created_by());
            assert_eq!(manager.extract_metadata(&dest, format).unwrap(), metadata);
            assert_eq!(manager.inspect(&dest).unwrap(), metadata);
        }
    }

    #[test]
    fn test_metadata_missing_on_plain_archive() {
        let manager = ArchiveManager::default();
        let src = source_tree();
        let out = tempfile::tempdir().unwrap();

        for format in [ArchiveFormat::TarGz, ArchiveFormat::Zip] {
            let dest = out.path().join(format!("plain{}", format.suffix()));
            manager.create_archive(src.path(), &dest, format, &[], &[]).unwrap();
            assert!(matches!(
                manager.extract_metadata(&dest, format),
                Err(Error::MetadataNotFound(_))
            ));
        }
    }

    #[test]
    fn test_zip_slip_rejected() {
        let out = tempfile::tempdir().unwrap();
        let archive_path = out.path().join("evil.zip");
        {
            let file = fs::File::create(&archive_path).unwrap();
            let mut zip = ::zip::ZipWriter::new(file);
            zip.start_file("../../evil", ::zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"pwned").unwrap();
            zip.finish().unwrap();
        }

        let dest = out.path().join("a/b");
        let manager = ArchiveManager::default();
        let err = manager
            .extract_archive(&archive_path, &dest, ArchiveFormat::Zip)
            .unwrap_err();
        assert!(matches!(err, Error::PathTraversal(_)));
        assert!(!out.path().join("evil").exists());
    }

    #[test]
    fn test_output_inside_source_is_skipped() {
        let manager = ArchiveManager::default();
        let src = source_tree();
        let dest = src.path().join("self.tar.gz");
        manager
            .create_archive(src.path(), &dest, ArchiveFormat::TarGz, &[], &[])
            .unwrap();

        let out = tempfile::tempdir().unwrap();
        manager
            .extract_archive(&dest, out.path(), ArchiveFormat::TarGz)
            .unwrap();
        assert!(out.path().join("bin/run").exists());
        assert!(!out.path().join("self.tar.gz").exists());
    }

    #[test]
    fn test_missing_source_dir() {
        let manager = ArchiveManager::default();
        let out = tempfile::tempdir().unwrap();
        let err = manager
            .create_archive(
                &out.path().join("nope"),
                &out.path().join("x.zip"),
                ArchiveFormat::Zip,
                &[],
                &[],
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
