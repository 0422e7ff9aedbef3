// src/server/index.rs
//! Repository catalog maintenance
//!
//! The catalog is one [`RepositoryIndex`] document. Scanning walks the
//! storage directory and adds every archive not already represented (same
//! filename and byte size). Package identity comes from the embedded
//! metadata block, or from the file name when the archive carries none.
//! Every mutation recomputes the statistics and rewrites the whole file.

use super::ServerConfig;
use crate::archive::{ArchiveFormat, ArchiveManager};
use crate::error::{Error, Result};
use crate::hash::sha256_file;
use crate::manifest::PackageMetadata;
use crate::repository::{FileEntry, PackageEntry, RepositoryIndex, SearchResult, VersionEntry};
use chrono::Utc;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Length of the popular packages list
pub const POPULAR_LIMIT: usize = 10;

/// Platform used when a file name does not name one
const DEFAULT_OS: &str = "linux";
const DEFAULT_ARCH: &str = "amd64";

/// Longest entry of `allowed` that `filename` ends with (after a dot)
pub(crate) fn match_format<'a>(filename: &str, allowed: &'a [String]) -> Option<&'a str> {
    let lower = filename.to_ascii_lowercase();
    allowed
        .iter()
        .filter(|format| lower.ends_with(&format!(".{}", format.to_ascii_lowercase())))
        .max_by_key(|format| format.len())
        .map(String::as_str)
}

/// Fields recovered from a `name-version-os-arch.format` file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub name: String,
    /// Empty when the name has a single dash-separated segment
    pub version: String,
    pub os: String,
    pub arch: String,
    pub format: String,
}

/// Best-effort parse of an archive file name
///
/// The longest allowed format suffix is stripped and the rest split on
/// `-`. With four or more segments the last two are OS and architecture;
/// otherwise the platform defaults to `linux`/`amd64`. The segment before
/// the platform is the version and everything ahead of it the name.
/// Returns `None` when no allowed format matches.
pub fn parse_filename(filename: &str, allowed_formats: &[String]) -> Option<ParsedFilename> {
    let format = match_format(filename, allowed_formats)?;
    let stem = &filename[..filename.len() - format.len() - 1];
    let parts: Vec<&str> = stem.split('-').collect();

    let (identity, os, arch) = if parts.len() >= 4 {
        let n = parts.len();
        (&parts[..n - 2], parts[n - 2], parts[n - 1])
    } else {
        (&parts[..], DEFAULT_OS, DEFAULT_ARCH)
    };

    let (name, version) = match identity.split_last() {
        Some((version, name)) if !name.is_empty() => (name.join("-"), version.to_string()),
        _ => (stem.to_string(), String::new()),
    };

    Some(ParsedFilename {
        name,
        version,
        os: os.to_string(),
        arch: arch.to_string(),
        format: format.to_string(),
    })
}

/// True when some file entry has this filename and byte size
pub fn is_indexed(index: &RepositoryIndex, filename: &str, size: u64) -> bool {
    index
        .packages
        .values()
        .flat_map(|package| &package.versions)
        .flat_map(|version| &version.files)
        .any(|file| file.filename == filename && file.size == size)
}

/// Version with the newest upload time, ties going to the later entry
pub fn latest_version(versions: &[VersionEntry]) -> Option<&VersionEntry> {
    versions.iter().fold(None, |best: Option<&VersionEntry>, v| match best {
        Some(b) if b.uploaded > v.uploaded => Some(b),
        _ => Some(v),
    })
}

/// Fold one archive into the catalog
///
/// Creates the package and version entries on first sight. A file entry
/// occupying the same (os, arch, format) slot is replaced and returned,
/// anything else is appended.
pub fn merge_file(
    index: &mut RepositoryIndex,
    metadata: &PackageMetadata,
    file: FileEntry,
) -> Option<FileEntry> {
    let manifest = &metadata.package_manifest;
    let now = Utc::now();

    let package = index
        .packages
        .entry(manifest.name.clone())
        .or_insert_with(|| PackageEntry {
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            author: manifest.author.clone(),
            license: manifest.license.clone(),
            homepage: manifest.homepage.clone(),
            repository: manifest.repository.clone(),
            keywords: manifest.keywords.clone(),
            versions: Vec::new(),
            latest_version: String::new(),
            downloads: 0,
            updated: now,
        });

    let slot = match package
        .versions
        .iter()
        .position(|v| v.version == manifest.version)
    {
        Some(slot) => slot,
        None => {
            package.versions.push(VersionEntry {
                version: manifest.version.clone(),
                description: manifest.description.clone(),
                dependencies: manifest.dependencies.clone(),
                dev_dependencies: manifest.dev_dependencies.clone(),
                files: Vec::new(),
                size: file.size,
                checksum: file.checksum.clone(),
                uploaded: now,
                downloads: 0,
            });
            package.versions.len() - 1
        }
    };

    let version = &mut package.versions[slot];
    let displaced = match version.files.iter_mut().find(|f| f.same_slot(&file)) {
        Some(existing) => Some(std::mem::replace(existing, file)),
        None => {
            version.files.push(file);
            None
        }
    };

    package.latest_version = latest_version(&package.versions)
        .map(|v| v.version.clone())
        .unwrap_or_default();
    package.updated = now;
    displaced
}

/// Recompute counts, totals and the popular list
pub fn recompute_statistics(index: &mut RepositoryIndex) {
    let stats = &mut index.statistics;
    stats.packages_by_license.clear();
    stats.packages_by_author.clear();
    stats.total_downloads = 0;

    for package in index.packages.values() {
        if !package.license.is_empty() {
            *stats
                .packages_by_license
                .entry(package.license.clone())
                .or_default() += 1;
        }
        if !package.author.is_empty() {
            *stats
                .packages_by_author
                .entry(package.author.clone())
                .or_default() += 1;
        }
        stats.total_downloads += package.downloads;
    }

    let mut by_downloads: Vec<(&String, u64)> = index
        .packages
        .iter()
        .map(|(name, package)| (name, package.downloads))
        .collect();
    // Stable sort keeps name order among equal counts
    by_downloads.sort_by(|a, b| b.1.cmp(&a.1));
    stats.popular_packages = by_downloads
        .into_iter()
        .take(POPULAR_LIMIT)
        .map(|(name, _)| name.clone())
        .collect();
}

/// Bump the package and version download counters
pub fn record_download(index: &mut RepositoryIndex, name: &str, version: &str) -> Result<()> {
    let package = index
        .packages
        .get_mut(name)
        .ok_or_else(|| Error::NotFound(format!("package {name}")))?;
    package.downloads += 1;
    if let Some(entry) = package.version_mut(version) {
        entry.downloads += 1;
    }
    Ok(())
}

/// Paths and tools the catalog operations need, outside the lock
struct IndexStore {
    storage_path: PathBuf,
    index_path: PathBuf,
    allowed_formats: Vec<String>,
    archives: ArchiveManager,
}

impl IndexStore {
    fn load(&self) -> RepositoryIndex {
        match fs::read_to_string(&self.index_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(index) => index,
                Err(e) => {
                    warn!(
                        "Index {} is unreadable, starting empty: {}",
                        self.index_path.display(),
                        e
                    );
                    RepositoryIndex::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Creating new index at {}", self.index_path.display());
                RepositoryIndex::default()
            }
            Err(e) => {
                warn!(
                    "Failed to read index {}, starting empty: {}",
                    self.index_path.display(),
                    e
                );
                RepositoryIndex::default()
            }
        }
    }

    /// Stamp, recompute statistics and rewrite the index file atomically
    fn persist(&self, index: &mut RepositoryIndex) -> Result<()> {
        index.last_updated = Utc::now();
        index.total_packages = index.packages.len();
        recompute_statistics(index);

        let parent = self
            .index_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(index)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.persist(&self.index_path).map_err(|e| e.error)?;
        debug!("Index written to {}", self.index_path.display());
        Ok(())
    }

    /// Add every archive in the storage directory not yet indexed
    ///
    /// Only top-level files are considered, since downloads resolve file
    /// names directly under the storage directory. New files are merged
    /// oldest first so the most recent archive ends up owning its slot.
    fn scan(&self, index: &mut RepositoryIndex) -> Result<usize> {
        fs::create_dir_all(&self.storage_path)?;

        let mut pending = Vec::new();
        for entry in WalkDir::new(&self.storage_path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable storage entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();
            if match_format(&filename, &self.allowed_formats).is_none() {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if is_indexed(index, &filename, meta.len()) {
                continue;
            }
            let modified = meta.modified().ok();
            pending.push((modified, filename, meta.len()));
        }
        pending.sort();

        let mut added = 0;
        for (_, filename, size) in pending {
            let path = self.storage_path.join(&filename);
            info!("Found new package file: {}", path.display());
            match self.add_file(index, &path, &filename, size) {
                Ok(()) => added += 1,
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        if added > 0 {
            info!("Indexed {} new package files", added);
        }
        Ok(added)
    }

    fn add_file(
        &self,
        index: &mut RepositoryIndex,
        path: &Path,
        filename: &str,
        size: u64,
    ) -> Result<()> {
        let checksum = sha256_file(path)?;
        let parsed = parse_filename(filename, &self.allowed_formats)
            .ok_or_else(|| Error::UnsupportedFormat(filename.to_string()))?;

        let metadata = match self
            .archives
            .extract_metadata(path, ArchiveFormat::detect(filename))
        {
            Ok(metadata)
                if !metadata.package_manifest.name.is_empty()
                    && !metadata.package_manifest.version.is_empty() =>
            {
                metadata
            }
            Ok(_) => {
                warn!("Metadata in {} has no name or version", filename);
                metadata_from_filename(&parsed, filename)?
            }
            Err(e) => {
                warn!("Could not read metadata from {}: {}", filename, e);
                metadata_from_filename(&parsed, filename)?
            }
        };

        let file = FileEntry {
            os: parsed.os,
            arch: parsed.arch,
            format: parsed.format,
            filename: filename.to_string(),
            size,
            checksum,
        };
        if let Some(old) = merge_file(index, &metadata, file) {
            if old.filename != filename {
                self.remove_superseded(&old.filename);
            }
        }
        self.persist(index)
    }

    /// Delete an archive that lost its slot so a rescan cannot bring it back
    fn remove_superseded(&self, filename: &str) {
        let path = self.storage_path.join(filename);
        match fs::remove_file(&path) {
            Ok(()) => info!("Removed superseded package file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove superseded {}: {}", path.display(), e),
        }
    }
}

fn metadata_from_filename(parsed: &ParsedFilename, filename: &str) -> Result<PackageMetadata> {
    if parsed.name.is_empty() || parsed.version.is_empty() {
        return Err(Error::InvalidManifest(format!(
            "cannot derive a package name and version from {filename}"
        )));
    }
    Ok(PackageMetadata::synthesized(&parsed.name, &parsed.version))
}

/// The repository catalog and its on-disk file, behind one mutex
#[derive(Clone)]
pub struct IndexManager {
    store: Arc<IndexStore>,
    index: Arc<Mutex<RepositoryIndex>>,
}

impl IndexManager {
    /// Load the persisted catalog (or start empty) and scan storage
    pub async fn open(config: &ServerConfig) -> Result<Self> {
        let store = IndexStore {
            storage_path: config.storage_path.clone(),
            index_path: config.index_path.clone(),
            allowed_formats: config.allowed_formats.clone(),
            archives: ArchiveManager::default(),
        };
        let manager = Self {
            store: Arc::new(store),
            index: Arc::new(Mutex::new(RepositoryIndex::default())),
        };

        manager
            .with_index(|store, index| {
                *index = store.load();
                store.scan(index)
            })
            .await?;
        Ok(manager)
    }

    /// Run a read-modify-write cycle on a blocking thread, holding the lock
    async fn with_index<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&IndexStore, &mut RepositoryIndex) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let mut guard = Arc::clone(&self.index).lock_owned().await;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store, &mut guard))
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))?
    }

    /// Read the catalog under the lock
    pub async fn read<R>(&self, f: impl FnOnce(&RepositoryIndex) -> R) -> R {
        let guard = self.index.lock().await;
        f(&guard)
    }

    /// Clone of the whole catalog
    pub async fn snapshot(&self) -> RepositoryIndex {
        self.read(RepositoryIndex::clone).await
    }

    pub async fn total_packages(&self) -> usize {
        self.read(|index| index.packages.len()).await
    }

    /// Index new archives in the storage directory, returning how many
    pub async fn scan(&self) -> Result<usize> {
        self.with_index(|store, index| store.scan(index)).await
    }

    /// Count one download of `name` `version` and persist
    pub async fn increment_download(&self, name: &str, version: &str) -> Result<()> {
        let name = name.to_string();
        let version = version.to_string();
        self.with_index(move |store, index| {
            record_download(index, &name, &version)?;
            store.persist(index)
        })
        .await
    }

    /// Ranked search over the catalog
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.read(|index| super::search_packages(index, query)).await
    }

    pub fn storage_path(&self) -> &Path {
        &self.store.storage_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{BuildManifest, PackageManifest};
    use tempfile::{TempDir, tempdir};

    fn formats() -> Vec<String> {
        ServerConfig::default().allowed_formats
    }

    fn file(filename: &str, size: u64) -> FileEntry {
        let parsed = parse_filename(filename, &formats()).unwrap();
        FileEntry {
            os: parsed.os,
            arch: parsed.arch,
            format: parsed.format,
            filename: filename.to_string(),
            size,
            checksum: format!("{size:064x}"),
        }
    }

    fn metadata(name: &str, version: &str) -> PackageMetadata {
        let mut manifest = PackageManifest::new_minimal(name, version);
        manifest.license = "MIT".to_string();
        manifest.author = "Jane".to_string();
        PackageMetadata::new(manifest, BuildManifest::default())
    }

    fn test_config(dir: &TempDir) -> ServerConfig {
        ServerConfig {
            storage_path: dir.path().join("packages"),
            index_path: dir.path().join("index.json"),
            ..ServerConfig::default()
        }
    }

    fn build_archive(dir: &Path, name: &str, version: &str, filename: &str) {
        let project = dir.join(format!("src-{name}-{version}"));
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("README"), format!("{name} {version}")).unwrap();

        let mut manifest = PackageManifest::new_minimal(name, version);
        manifest.description = format!("{name} tool");
        manifest.keywords = vec!["cli".to_string()];
        let mut metadata = PackageMetadata::new(manifest, BuildManifest::default());

        let dest = dir.join("packages").join(filename);
        ArchiveManager::default()
            .create_archive_with_metadata(
                &project,
                &dest,
                ArchiveFormat::detect(filename),
                3,
                &[],
                &[],
                &mut metadata,
            )
            .unwrap();
    }

    #[test]
    fn test_parse_filename_with_platform() {
        let parsed = parse_filename("my-tool-1.2.0-darwin-arm64.tar.zst", &formats()).unwrap();
        assert_eq!(parsed.name, "my-tool");
        assert_eq!(parsed.version, "1.2.0");
        assert_eq!(parsed.os, "darwin");
        assert_eq!(parsed.arch, "arm64");
        assert_eq!(parsed.format, "tar.zst");
    }

    #[test]
    fn test_parse_filename_defaults_platform() {
        let parsed = parse_filename("foo-1.0.0.zip", &formats()).unwrap();
        assert_eq!(parsed.name, "foo");
        assert_eq!(parsed.version, "1.0.0");
        assert_eq!((parsed.os.as_str(), parsed.arch.as_str()), ("linux", "amd64"));

        let bare = parse_filename("foo.tar.gz", &formats()).unwrap();
        assert_eq!(bare.name, "foo");
        assert!(bare.version.is_empty());

        assert!(parse_filename("foo-1.0.0.rpm", &formats()).is_none());
    }

    #[test]
    fn test_merge_replaces_same_slot_and_appends_others() {
        let mut index = RepositoryIndex::default();
        let meta = metadata("foo", "1.0.0");

        merge_file(&mut index, &meta, file("foo-1.0.0-linux-amd64.tar.zst", 10));
        merge_file(&mut index, &meta, file("foo-1.0.0-linux-amd64.tar.zst", 12));
        merge_file(&mut index, &meta, file("foo-1.0.0-linux-arm64.tar.zst", 11));

        let package = &index.packages["foo"];
        assert_eq!(package.versions.len(), 1);
        let files = &package.versions[0].files;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].size, 12);
        assert_eq!(files[1].arch, "arm64");
        assert_eq!(package.latest_version, "1.0.0");
    }

    #[test]
    fn test_one_file_per_platform_and_format() {
        let mut index = RepositoryIndex::default();
        let meta = PackageMetadata::synthesized("foo", "1.0.0");

        assert!(merge_file(&mut index, &meta, file("foo-1.0.0.tar.zst", 10)).is_none());
        let displaced = merge_file(&mut index, &meta, file("foo-1.0.0-linux-amd64.tar.zst", 20));
        assert_eq!(displaced.unwrap().filename, "foo-1.0.0.tar.zst");

        let version = &index.packages["foo"].versions[0];
        assert_eq!(version.files.len(), 1);
        let current = version.file_for("linux", "amd64").unwrap();
        assert_eq!(current.filename, "foo-1.0.0-linux-amd64.tar.zst");
        assert_eq!(current.size, 20);

        merge_file(&mut index, &meta, file("foo-1.0.0.zip", 5));
        assert_eq!(index.packages["foo"].versions[0].files.len(), 2);
    }

    #[test]
    fn test_latest_version_is_newest_upload() {
        let mut index = RepositoryIndex::default();
        merge_file(&mut index, &metadata("foo", "2.0.0"), file("foo-2.0.0.tar.zst", 1));
        merge_file(&mut index, &metadata("foo", "1.5.0"), file("foo-1.5.0.tar.zst", 2));

        let package = &index.packages["foo"];
        assert_eq!(package.versions[0].version, "2.0.0");
        assert_eq!(package.latest_version, "1.5.0");
    }

    #[test]
    fn test_statistics_and_popular_order() {
        let mut index = RepositoryIndex::default();
        for name in ["delta", "alpha", "charlie", "bravo"] {
            merge_file(
                &mut index,
                &metadata(name, "1.0.0"),
                file(&format!("{name}-1.0.0.tar.zst"), 1),
            );
        }
        record_download(&mut index, "charlie", "1.0.0").unwrap();
        record_download(&mut index, "charlie", "1.0.0").unwrap();
        record_download(&mut index, "delta", "1.0.0").unwrap();

        recompute_statistics(&mut index);
        let stats = &index.statistics;
        assert_eq!(stats.total_downloads, 3);
        assert_eq!(stats.packages_by_license["MIT"], 4);
        assert_eq!(stats.packages_by_author["Jane"], 4);
        assert_eq!(
            stats.popular_packages,
            vec!["charlie", "delta", "alpha", "bravo"]
        );
        assert_eq!(index.packages["charlie"].versions[0].downloads, 2);
    }

    #[test]
    fn test_record_download_unknown_package() {
        let mut index = RepositoryIndex::default();
        assert!(record_download(&mut index, "ghost", "1.0.0").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_scan_reads_metadata_and_falls_back_to_filename() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        build_archive(dir.path(), "hello", "0.3.0", "hello-0.3.0-linux-amd64.tar.zst");
        fs::write(
            config.storage_path.join("legacy-2.1.0-darwin-arm64.tar.gz"),
            b"not really an archive",
        )
        .unwrap();
        fs::write(config.storage_path.join("notes.txt"), b"ignored").unwrap();

        let manager = IndexManager::open(&config).await.unwrap();
        let index = manager.snapshot().await;
        assert_eq!(index.total_packages, 2);

        let hello = &index.packages["hello"];
        assert_eq!(hello.description, "hello tool");
        assert_eq!(hello.keywords, vec!["cli"]);
        let hello_file = &hello.versions[0].files[0];
        assert_eq!(hello_file.format, "tar.zst");
        assert_eq!(hello_file.checksum.len(), 64);

        let legacy = &index.packages["legacy"];
        assert_eq!(legacy.latest_version, "2.1.0");
        let legacy_file = &legacy.versions[0].files[0];
        assert_eq!((legacy_file.os.as_str(), legacy_file.arch.as_str()), ("darwin", "arm64"));

        assert!(config.index_path.exists());
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        build_archive(dir.path(), "hello", "0.3.0", "hello-0.3.0.tar.zst");
        build_archive(dir.path(), "world", "1.0.0", "world-1.0.0.zip");

        let manager = IndexManager::open(&config).await.unwrap();
        let before = manager.snapshot().await;

        assert_eq!(manager.scan().await.unwrap(), 0);
        let after = manager.snapshot().await;
        assert_eq!(before.total_packages, after.total_packages);
        assert_eq!(before.packages, after.packages);

        let reopened = IndexManager::open(&config).await.unwrap();
        assert_eq!(reopened.snapshot().await.packages, before.packages);
    }

    #[tokio::test]
    async fn test_scan_keeps_one_archive_per_slot() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        build_archive(dir.path(), "foo", "1.0.0", "foo-1.0.0-linux-amd64.tar.zst");
        build_archive(dir.path(), "foo", "1.0.0", "foo-1.0.0.tar.zst");

        let manager = IndexManager::open(&config).await.unwrap();
        let index = manager.snapshot().await;
        let files = &index.packages["foo"].versions[0].files;
        assert_eq!(files.len(), 1);

        let kept = config.storage_path.join(&files[0].filename);
        assert!(kept.exists());
        let on_disk = fs::read_dir(&config.storage_path)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("foo-"))
            .count();
        assert_eq!(on_disk, 1);

        assert_eq!(manager.scan().await.unwrap(), 0);
        assert_eq!(manager.snapshot().await.packages, index.packages);
    }

    #[tokio::test]
    async fn test_scan_ignores_nested_directories() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        build_archive(dir.path(), "top", "1.0.0", "top-1.0.0.tar.zst");
        build_archive(dir.path(), "deep", "1.0.0", "nested/deep-1.0.0.tar.zst");

        let manager = IndexManager::open(&config).await.unwrap();
        let index = manager.snapshot().await;
        assert!(index.packages.contains_key("top"));
        assert!(!index.packages.contains_key("deep"));
    }

    #[tokio::test]
    async fn test_increment_download_persists() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir);
        build_archive(dir.path(), "hello", "0.3.0", "hello-0.3.0.tar.zst");

        let manager = IndexManager::open(&config).await.unwrap();
        manager.increment_download("hello", "0.3.0").await.unwrap();
        manager.increment_download("hello", "9.9.9").await.unwrap();
        assert!(manager.increment_download("ghost", "1.0.0").await.is_err());

        let saved: RepositoryIndex =
            serde_json::from_str(&fs::read_to_string(&config.index_path).unwrap()).unwrap();
        assert_eq!(saved.packages["hello"].downloads, 2);
        assert_eq!(saved.packages["hello"].versions[0].downloads, 1);
        assert_eq!(saved.statistics.total_downloads, 2);
    }
}
