// src/archive/select.rs

//! Source tree selection for archive creation
//!
//! Include entries are globs relative to the source directory; a matched
//! directory contributes its whole subtree. Exclude entries are globs checked
//! against both the relative path and the bare file name, and an excluded
//! directory prunes everything below it.

use super::path::to_entry_name;
use crate::error::Result;
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One file or directory chosen for an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEntry {
    /// Entry name inside the archive, `/`-separated
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Compiled exclude list
#[derive(Debug, Default)]
pub struct ExcludeSet {
    patterns: Vec<(String, Option<Pattern>)>,
    paths: Vec<PathBuf>,
}

impl ExcludeSet {
    pub fn new(excludes: &[String]) -> Self {
        let patterns = excludes
            .iter()
            .map(|raw| {
                let trimmed = raw.trim_start_matches("./").trim_end_matches('/').to_string();
                let compiled = Pattern::new(&trimmed).ok();
                (trimmed, compiled)
            })
            .collect();
        Self {
            patterns,
            paths: Vec::new(),
        }
    }

    /// Also skip a specific file on disk (used for the archive being written)
    ///
    /// The path must be canonical, as selection walks a canonicalized root.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.paths.push(path);
        self
    }

    /// Check a relative entry name and its disk path
    pub fn is_excluded(&self, name: &str, path: &Path) -> bool {
        if self.paths.iter().any(|p| p == path) {
            return true;
        }
        if name.is_empty() {
            return false;
        }
        let file_name = name.rsplit('/').next().unwrap_or(name);
        self.patterns.iter().any(|(raw, pattern)| {
            raw == name
                || raw == file_name
                || pattern
                    .as_ref()
                    .is_some_and(|p| p.matches(name) || p.matches(file_name))
        })
    }
}

/// Collect the entries to archive from `root`
///
/// Output is sorted by entry name and free of duplicates, so the same tree
/// always produces the same archive layout.
pub fn select_entries(
    root: &Path,
    includes: &[String],
    excludes: &ExcludeSet,
) -> Result<Vec<SelectedEntry>> {
    let root = &root.canonicalize()?;
    let mut starts = Vec::new();
    if includes.is_empty() {
        starts.push(root.to_path_buf());
    } else {
        let escaped_root = Pattern::escape(&root.to_string_lossy());
        for include in includes {
            let include = include.trim_start_matches("./");
            let pattern = format!("{}/{}", escaped_root.trim_end_matches('/'), include);
            let mut matched = false;
            if let Ok(paths) = glob::glob(&pattern) {
                for path in paths.flatten() {
                    if path.starts_with(root) {
                        starts.push(path);
                        matched = true;
                    }
                }
            }
            if !matched {
                debug!("Include pattern '{}' matched nothing", include);
            }
        }
    }

    let mut seen = BTreeSet::new();
    let mut selected = Vec::new();

    for start in starts {
        let walker = WalkDir::new(&start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let name = relative_name(root, entry.path());
                !excludes.is_excluded(&name, entry.path())
            });

        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            if !file_type.is_dir() && !file_type.is_file() {
                debug!("Skipping special file {}", entry.path().display());
                continue;
            }

            let name = relative_name(root, entry.path());
            if name.is_empty() || !seen.insert(name.clone()) {
                continue;
            }

            selected.push(SelectedEntry {
                name,
                path: entry.path().to_path_buf(),
                is_dir: file_type.is_dir(),
            });
        }
    }

    selected.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(selected)
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(to_entry_name)
        .unwrap_or_default()
}
