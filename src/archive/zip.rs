// src/archive/zip.rs

//! Native zip container
//!
//! Metadata is stored twice: as the archive comment and as a literal
//! `.criage_metadata.json` entry. Either copy is enough for a reader.

use super::path::resolve_entry_path;
use super::select::SelectedEntry;
use super::{ArchiveBackend, MAX_EXTRACTION_FILE_SIZE, METADATA_JSON_ENTRY, MetadataBlock, set_mode};
use crate::error::{Error, Result};
use crate::manifest::PackageMetadata;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub(super) struct ZipBackend {
    pub level: i32,
}

impl ZipBackend {
    fn options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(self.level.clamp(0, 9))))
    }
}

impl ArchiveBackend for ZipBackend {
    fn create(
        &self,
        entries: &[SelectedEntry],
        dest: &Path,
        metadata: Option<&MetadataBlock>,
    ) -> Result<()> {
        let file = File::create(dest)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        if let Some(block) = metadata {
            zip.set_comment(block.metadata_json.clone());
            zip.start_file(METADATA_JSON_ENTRY, self.options().unix_permissions(0o644))?;
            zip.write_all(block.metadata_json.as_bytes())?;
        }

        for entry in entries {
            let mode = file_mode(&entry.path)?;
            if entry.is_dir {
                zip.add_directory(
                    format!("{}/", entry.name),
                    self.options().unix_permissions(mode),
                )?;
            } else {
                zip.start_file(entry.name.as_str(), self.options().unix_permissions(mode))?;
                let mut source = File::open(&entry.path)?;
                io::copy(&mut source, &mut zip)?;
            }
        }

        let mut writer = zip.finish()?;
        writer.flush()?;
        debug!("Wrote {} entries to {}", entries.len(), dest.display());
        Ok(())
    }

    fn extract(&self, src: &Path, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let mut archive = ZipArchive::new(BufReader::new(File::open(src)?))?;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_string();
            if name.trim_start_matches("./") == METADATA_JSON_ENTRY {
                continue;
            }
            let Some(target) = resolve_entry_path(dest, &name)? else {
                continue;
            };

            if file.is_dir() {
                fs::create_dir_all(&target)?;
                set_mode(&target, 0o755)?;
                continue;
            }

            if file.size() > MAX_EXTRACTION_FILE_SIZE {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("entry {name} exceeds the extraction size limit"),
                )));
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mode = file.unix_mode();
            let mut out = File::create(&target)?;
            io::copy(&mut file, &mut out)?;
            drop(out);
            if let Some(mode) = mode {
                set_mode(&target, mode & 0o7777)?;
            }
        }

        Ok(())
    }

    fn read_metadata(&self, src: &Path) -> Result<PackageMetadata> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(src)?))?;

        if !archive.comment().is_empty() {
            match serde_json::from_slice(archive.comment()) {
                Ok(metadata) => return Ok(metadata),
                Err(e) => debug!("Zip comment of {} is not metadata: {}", src.display(), e),
            }
        }

        let mut entry = match archive.by_name(METADATA_JSON_ENTRY) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(Error::MetadataNotFound(src.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut body = Vec::new();
        entry.read_to_end(&mut body)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(path: &Path) -> Result<u32> {
    Ok(if fs::metadata(path)?.is_dir() { 0o755 } else { 0o644 })
}
