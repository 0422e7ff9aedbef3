// src/commands/build.rs
//! Package authoring commands: create, build, publish, metadata

use super::format_size;
use anyhow::{Context, Result};
use criage::archive::ArchiveFormat;
use criage::manager::{BuildOptions, PackageManager};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn cmd_create(
    pm: &PackageManager,
    name: &str,
    template: &str,
    author: &str,
    description: &str,
) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let dir = pm
        .create(&cwd, name, template, author, description)
        .with_context(|| format!("Failed to create package {}", name))?;

    println!("Created package {} in {}", name, dir.display());
    println!("Next steps:");
    println!("  cd {}", name);
    println!("  criage build");
    Ok(())
}

pub fn cmd_build(
    pm: &PackageManager,
    output: Option<PathBuf>,
    format: Option<&str>,
    level: Option<i32>,
) -> Result<()> {
    let format = format
        .map(|f| f.parse::<ArchiveFormat>())
        .transpose()
        .context("Invalid archive format")?;

    info!("Building package in current directory");
    let archive = pm
        .build(
            Path::new("."),
            &BuildOptions {
                output,
                format,
                level,
            },
        )
        .context("Build failed")?;

    let size = fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
    println!("Built {} ({})", archive.display(), format_size(size));
    Ok(())
}

pub fn cmd_publish(pm: &PackageManager, registry: Option<&str>, token: Option<&str>) -> Result<()> {
    let archive = pm
        .publish(Path::new("."), registry, token)
        .context("Publish failed")?;
    println!("Published {}", archive.display());
    Ok(())
}

pub fn cmd_metadata(pm: &PackageManager, archive: &Path) -> Result<()> {
    let metadata = pm
        .inspect_archive(archive)
        .with_context(|| format!("Failed to read metadata from {}", archive.display()))?;

    let manifest = &metadata.package_manifest;
    println!("Package:      {} {}", manifest.name, manifest.version);
    if !manifest.description.is_empty() {
        println!("Description:  {}", manifest.description);
    }
    if !manifest.author.is_empty() {
        println!("Author:       {}", manifest.author);
    }
    if !manifest.license.is_empty() {
        println!("License:      {}", manifest.license);
    }
    println!("Compression:  {}", metadata.compression_type);
    println!("Created:      {}", metadata.created_at.to_rfc3339());
    println!("Created by:   {}", metadata.created_by);
    if let Some(checksum) = &metadata.checksum {
        println!("Checksum:     {}", checksum);
    }

    if !manifest.dependencies.is_empty() {
        println!("Dependencies:");
        for (name, range) in &manifest.dependencies {
            println!("  {} {}", name, range);
        }
    }

    let hooks = manifest.hooks();
    for (phase, commands) in [
        ("pre_install", &hooks.pre_install),
        ("post_install", &hooks.post_install),
        ("pre_remove", &hooks.pre_remove),
        ("post_remove", &hooks.post_remove),
        ("pre_update", &hooks.pre_update),
        ("post_update", &hooks.post_update),
    ] {
        for command in commands {
            println!("Hook {}: {}", phase, command);
        }
    }

    let build = &metadata.build_manifest;
    if !build.targets.is_empty() {
        let targets: Vec<String> = build
            .targets
            .iter()
            .map(|t| format!("{}/{}", t.os, t.arch))
            .collect();
        println!("Targets:      {}", targets.join(", "));
    }
    Ok(())
}
