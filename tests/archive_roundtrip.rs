// tests/archive_roundtrip.rs

//! Archive creation and extraction across every supported format.

use criage::Error;
use criage::archive::{ArchiveFormat, ArchiveManager, METADATA_ENTRY, METADATA_JSON_ENTRY};
use criage::manifest::{BuildManifest, PackageManifest, PackageMetadata};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::tempdir;
use walkdir::WalkDir;

/// Relative path -> (contents, mode) for every file under `root`
fn snapshot(root: &Path) -> BTreeMap<String, (Vec<u8>, u32)> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let name = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            let mode = e.metadata().unwrap().permissions().mode() & 0o777;
            (name, (fs::read(e.path()).unwrap(), mode))
        })
        .collect()
}

fn project() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("share/doc/deep/er")).unwrap();
    fs::create_dir_all(root.join("logs")).unwrap();

    fs::write(root.join("bin/tool"), b"#!/bin/sh\necho tool\n").unwrap();
    fs::set_permissions(root.join("bin/tool"), fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(root.join("share/doc/deep/er/README"), "nested ✓\n").unwrap();
    fs::write(root.join("share/empty"), b"").unwrap();
    fs::write(root.join("config.ini"), b"key=value\n").unwrap();
    fs::set_permissions(root.join("config.ini"), fs::Permissions::from_mode(0o600)).unwrap();
    fs::write(root.join("logs/run.log"), b"noise\n").unwrap();
    fs::write(root.join("big.bin"), vec![7u8; 256 * 1024]).unwrap();
    dir
}

#[test]
fn test_every_format_preserves_contents_and_modes() {
    let manager = ArchiveManager::default();
    let src = project();
    let expected = snapshot(src.path());
    let out = tempdir().unwrap();

    for format in ArchiveFormat::ALL {
        let archive = out.path().join(format!("pkg{}", format.suffix()));
        manager
            .create_archive(src.path(), &archive, format, &[], &[])
            .unwrap();

        let dest = out.path().join(format!("x-{}", format.name()));
        manager.extract_archive(&archive, &dest, format).unwrap();

        assert_eq!(snapshot(&dest), expected, "{format} changed the tree");
        assert!(dest.join("share/doc/deep/er").is_dir());
    }
}

#[test]
fn test_metadata_entries_stay_out_of_extracted_tree() {
    let manager = ArchiveManager::default();
    let src = project();
    let out = tempdir().unwrap();

    for format in ArchiveFormat::ALL {
        let archive = out.path().join(format!("meta{}", format.suffix()));
        let mut metadata = PackageMetadata::new(
            PackageManifest::new_minimal("tool", "0.1.0"),
            BuildManifest::default(),
        );
        manager
            .create_archive_with_metadata(src.path(), &archive, format, 6, &[], &[], &mut metadata)
            .unwrap();

        let dest = out.path().join(format!("x-{}", format.name()));
        manager.extract_archive(&archive, &dest, format).unwrap();
        assert!(!dest.join(METADATA_ENTRY).exists());
        assert!(!dest.join(METADATA_JSON_ENTRY).exists());
        assert_eq!(snapshot(&dest), snapshot(src.path()));
    }
}

#[test]
fn test_excludes_and_includes_are_honored() {
    let manager = ArchiveManager::default();
    let src = project();
    let out = tempdir().unwrap();

    let archive = out.path().join("filtered.tar.gz");
    manager
        .create_archive(
            src.path(),
            &archive,
            ArchiveFormat::TarGz,
            &[],
            &["logs".to_string(), "*.bin".to_string()],
        )
        .unwrap();
    let dest = out.path().join("filtered");
    manager
        .extract_archive(&archive, &dest, ArchiveFormat::TarGz)
        .unwrap();
    assert!(!dest.join("logs").exists());
    assert!(!dest.join("big.bin").exists());
    assert!(dest.join("bin/tool").exists());

    let archive = out.path().join("bin-only.zip");
    manager
        .create_archive(src.path(), &archive, ArchiveFormat::Zip, &["bin/*".to_string()], &[])
        .unwrap();
    let dest = out.path().join("bin-only");
    manager.extract_archive(&archive, &dest, ArchiveFormat::Zip).unwrap();
    let names: Vec<String> = snapshot(&dest).into_keys().collect();
    assert_eq!(names, vec!["bin/tool"]);
}

#[test]
fn test_metadata_with_empty_maps_and_unicode() {
    let manager = ArchiveManager::default();
    let src = project();
    let out = tempdir().unwrap();

    let mut manifest = PackageManifest::new_minimal("ünïcode-pkg", "2.0.0-rc.1");
    manifest.description = "日本語の説明".to_string();
    manifest.keywords = vec!["ключ".to_string()];
    let mut build = BuildManifest::synthesize(&manifest, "tar.xz", 9);
    build.build_env = BTreeMap::new();
    let mut metadata = PackageMetadata::new(manifest, build);

    let archive = out.path().join("unicode.tar.xz");
    manager
        .create_archive_with_metadata(src.path(), &archive, ArchiveFormat::TarXz, 9, &[], &[], &mut metadata)
        .unwrap();

    let read = manager.inspect(&archive).unwrap();
    assert_eq!(read, metadata);
    assert_eq!(read.package_manifest.description, "日本語の説明");
    assert!(read.package_manifest.dependencies.is_empty());
    assert!(read.build_manifest.build_env.is_empty());
    assert_eq!(read.compression_type, "tar.xz");
}

#[test]
fn test_tar_entry_escaping_root_is_rejected() {
    let out = tempdir().unwrap();
    let archive = out.path().join("evil.tar.gz");
    {
        let file = fs::File::create(&archive).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let payload = b"pwned";
        let mut header = tar::Header::new_gnu();
        let name = b"../../evil";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, &payload[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap().flush().unwrap();
    }

    let dest = out.path().join("a/b");
    let err = ArchiveManager::default()
        .extract_archive(&archive, &dest, ArchiveFormat::TarGz)
        .unwrap_err();
    assert!(matches!(err, Error::PathTraversal(_)), "{err}");
    assert!(!out.path().join("evil").exists());
}

#[test]
fn test_unknown_extension_detects_as_zstd() {
    assert_eq!(ArchiveFormat::detect("package.unknownext"), ArchiveFormat::TarZst);

    let manager = ArchiveManager::default();
    let src = project();
    let out = tempdir().unwrap();
    let archive = out.path().join("package.unknownext");
    manager
        .create_archive(src.path(), &archive, ArchiveFormat::detect("package.unknownext"), &[], &[])
        .unwrap();
    let dest = out.path().join("x");
    manager
        .extract_archive(&archive, &dest, ArchiveFormat::TarZst)
        .unwrap();
    assert!(dest.join("bin/tool").exists());
}
