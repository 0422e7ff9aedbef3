// src/archive/tar.rs

//! tar container shared by the zstd, lz4, xz and gzip formats
//!
//! The metadata block travels as PAX extended records attached to a
//! zero-length `.criage_metadata` entry written before any payload entry.

use super::codec::CodecPools;
use super::format::ArchiveFormat;
use super::path::resolve_entry_path;
use super::select::SelectedEntry;
use super::{
    ArchiveBackend, MAX_EXTRACTION_FILE_SIZE, METADATA_ENTRY, METADATA_JSON_ENTRY, MetadataBlock,
    PAX_BUILD_MANIFEST, PAX_METADATA, PAX_PACKAGE_MANIFEST, PAX_VERSION, set_mode,
};
use crate::error::{Error, Result};
use crate::manifest::{BuildManifest, PackageManifest, PackageMetadata};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

pub(super) struct TarBackend<'a> {
    pub pools: &'a CodecPools,
    pub format: ArchiveFormat,
    pub level: i32,
}

impl TarBackend<'_> {
    fn open_archive(&self, src: &Path) -> Result<Archive<Box<dyn Read + '_>>> {
        let file = File::open(src)?;
        let reader = self.pools.decompressor(self.format, BufReader::new(file))?;
        Ok(Archive::new(reader))
    }
}

impl ArchiveBackend for TarBackend<'_> {
    fn create(
        &self,
        entries: &[SelectedEntry],
        dest: &Path,
        metadata: Option<&MetadataBlock>,
    ) -> Result<()> {
        let file = File::create(dest)?;
        let sink = self
            .pools
            .compressor(self.format, BufWriter::new(file), self.level)?;
        let mut builder = Builder::new(sink);
        builder.follow_symlinks(false);

        if let Some(block) = metadata {
            append_metadata(&mut builder, block)?;
        }

        for entry in entries {
            if entry.is_dir {
                builder.append_dir(&entry.name, &entry.path)?;
            } else {
                let mut file = File::open(&entry.path)?;
                builder.append_file(&entry.name, &mut file)?;
            }
        }

        let sink = builder.into_inner()?;
        let mut writer = sink.finish()?;
        writer.flush()?;
        debug!("Wrote {} entries to {}", entries.len(), dest.display());
        Ok(())
    }

    fn extract(&self, src: &Path, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let mut archive = self.open_archive(src)?;

        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            if is_metadata_entry(&name) {
                continue;
            }
            let Some(target) = resolve_entry_path(dest, &name)? else {
                continue;
            };

            match entry.header().entry_type() {
                EntryType::Directory => {
                    fs::create_dir_all(&target)?;
                    set_mode(&target, 0o755)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    let size = entry.header().size()?;
                    if size > MAX_EXTRACTION_FILE_SIZE {
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("entry {name} exceeds the extraction size limit ({size} bytes)"),
                        )));
                    }
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let mode = entry.header().mode()?;
                    let mut out = File::create(&target)?;
                    io::copy(&mut entry, &mut out)?;
                    drop(out);
                    set_mode(&target, mode & 0o7777)?;
                }
                other => {
                    debug!("Skipping {:?} entry {}", other, name);
                }
            }
        }

        Ok(())
    }

    fn read_metadata(&self, src: &Path) -> Result<PackageMetadata> {
        let mut archive = self.open_archive(src)?;

        for entry in archive.entries()? {
            let mut entry = entry?;

            let mut package_manifest = None;
            let mut build_manifest = None;
            if let Some(extensions) = entry.pax_extensions()? {
                for extension in extensions {
                    let extension = extension?;
                    match extension.key() {
                        Ok(PAX_METADATA) => {
                            return Ok(serde_json::from_slice(extension.value_bytes())?);
                        }
                        Ok(PAX_PACKAGE_MANIFEST) => {
                            package_manifest = Some(serde_json::from_slice::<PackageManifest>(
                                extension.value_bytes(),
                            )?);
                        }
                        Ok(PAX_BUILD_MANIFEST) => {
                            build_manifest = Some(serde_json::from_slice::<BuildManifest>(
                                extension.value_bytes(),
                            )?);
                        }
                        _ => {}
                    }
                }
            }

            if let Some(package_manifest) = package_manifest {
                let mut metadata =
                    PackageMetadata::new(package_manifest, build_manifest.unwrap_or_default());
                metadata.compression_type = self.format.name().to_string();
                metadata.created_at = entry_time(entry.header());
                return Ok(metadata);
            }

            let name = entry.path()?.to_string_lossy().into_owned();
            if is_metadata_entry(&name) && entry.header().size()? > 0 {
                let mut body = Vec::new();
                entry.read_to_end(&mut body)?;
                return Ok(serde_json::from_slice(&body)?);
            }

            let base = name.trim_start_matches("./");
            if !base.is_empty() && !base.starts_with('.') {
                break;
            }
        }

        Err(Error::MetadataNotFound(src.display().to_string()))
    }
}

fn append_metadata<W: Write>(builder: &mut Builder<W>, block: &MetadataBlock) -> Result<()> {
    builder.append_pax_extensions([
        (PAX_METADATA, block.metadata_json.as_bytes()),
        (PAX_VERSION, block.tool_version.as_bytes()),
        (PAX_PACKAGE_MANIFEST, block.package_manifest_json.as_bytes()),
        (PAX_BUILD_MANIFEST, block.build_manifest_json.as_bytes()),
    ])?;

    let mut header = Header::new_ustar();
    header.set_entry_type(EntryType::Regular);
    header.set_size(0);
    header.set_mode(0o644);
    header.set_mtime(block.created_at.timestamp().max(0) as u64);
    builder.append_data(&mut header, METADATA_ENTRY, io::empty())?;
    Ok(())
}

fn is_metadata_entry(name: &str) -> bool {
    let name = name.trim_start_matches("./");
    name == METADATA_ENTRY || name == METADATA_JSON_ENTRY
}

fn entry_time(header: &Header) -> DateTime<Utc> {
    header
        .mtime()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        .unwrap_or_else(Utc::now)
}
