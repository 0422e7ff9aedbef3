// src/commands/query.rs
//! Search, list and info commands

use super::{format_size, print_warnings};
use anyhow::{Context, Result};
use criage::manager::PackageManager;
use criage::registry::Scope;

pub fn cmd_search(pm: &PackageManager, query: &str) -> Result<()> {
    let outcome = pm.search(query);
    print_warnings(&outcome.warnings);

    if outcome.results.is_empty() {
        println!("No packages found matching '{}'", query);
        return Ok(());
    }

    println!("Found {} package(s):", outcome.results.len());
    for result in &outcome.results {
        println!("  {} {} [{}]", result.name, result.version, result.repository);
        if !result.description.is_empty() {
            println!("      {}", result.description);
        }
        println!(
            "      author: {}, downloads: {}, score: {:.1}",
            if result.author.is_empty() { "-" } else { &result.author },
            result.downloads,
            result.score
        );
    }
    Ok(())
}

pub fn cmd_list(pm: &PackageManager, global: bool, all_scopes: bool, outdated: bool) -> Result<()> {
    let scope = if all_scopes {
        None
    } else {
        Some(Scope::from_global(global))
    };
    let packages = pm.list(scope, outdated);

    if packages.is_empty() {
        if outdated {
            println!("All packages are up to date");
        } else {
            println!("No packages installed");
        }
        return Ok(());
    }

    println!("Installed packages:");
    for info in &packages {
        println!(
            "  {} {} ({}, {})",
            info.name,
            info.version,
            info.scope(),
            format_size(info.size)
        );
    }
    println!("\nTotal: {} package(s)", packages.len());
    Ok(())
}

pub fn cmd_info(pm: &PackageManager, package: &str) -> Result<()> {
    let info = pm
        .info(package)
        .with_context(|| format!("Package {} not found", package))?;

    println!("Name:         {}", info.name);
    println!("Version:      {}", info.version);
    if !info.description.is_empty() {
        println!("Description:  {}", info.description);
    }
    if !info.author.is_empty() {
        println!("Author:       {}", info.author);
    }
    println!("Scope:        {}", info.scope());
    println!("Installed:    {}", info.install_date.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Location:     {}", info.install_path.display());
    println!("Size:         {}", format_size(info.size));
    println!("Files:        {}", info.files.len());

    if !info.dependencies.is_empty() {
        println!("Dependencies:");
        for (name, range) in &info.dependencies {
            println!("  {} {}", name, range);
        }
    }
    if !info.scripts.is_empty() {
        println!("Scripts:");
        for (name, command) in &info.scripts {
            println!("  {}: {}", name, command);
        }
    }
    Ok(())
}
