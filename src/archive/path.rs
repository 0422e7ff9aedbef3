// src/archive/path.rs

//! Path checks for archive entries and uploaded file names
//!
//! Entry names come from untrusted archives. Anything that could land
//! outside the extraction root is rejected outright rather than rewritten.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Turn an archive entry name into a relative path
///
/// Rejects `..` components and absolute paths (including Windows drive
/// prefixes). `.` components are dropped. Returns `Ok(None)` for names that
/// normalize to nothing, such as `./`.
///
/// # Examples
///
/// ```
/// use criage::archive::path::entry_relative_path;
/// use std::path::PathBuf;
///
/// assert_eq!(
///     entry_relative_path("./bin/tool").unwrap(),
///     Some(PathBuf::from("bin/tool"))
/// );
/// assert!(entry_relative_path("../../evil").is_err());
/// assert!(entry_relative_path("/etc/passwd").is_err());
/// ```
pub fn entry_relative_path(name: &str) -> Result<Option<PathBuf>> {
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(Error::PathTraversal(name.to_string()));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(name.to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(normalized))
    }
}

/// Resolve an entry name under `root`, failing if it would escape
///
/// Besides the lexical check, the deepest existing ancestor of the result is
/// canonicalized so that a symlink planted by an earlier entry cannot
/// redirect later writes outside the root.
pub fn resolve_entry_path(root: &Path, name: &str) -> Result<Option<PathBuf>> {
    let Some(relative) = entry_relative_path(name)? else {
        return Ok(None);
    };
    let joined = root.join(&relative);

    if let Ok(canonical_root) = root.canonicalize() {
        let mut ancestor = joined.parent();
        while let Some(dir) = ancestor {
            if let Ok(canonical) = dir.canonicalize() {
                if !canonical.starts_with(&canonical_root) {
                    return Err(Error::PathTraversal(format!(
                        "{} escapes {}",
                        joined.display(),
                        root.display()
                    )));
                }
                break;
            }
            ancestor = dir.parent();
        }
    }

    Ok(Some(joined))
}

/// Reduce an untrusted file name to its final component
///
/// Returns `None` for names that are empty, dot-leading, or that consist of
/// nothing but separators.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last.starts_with('.') {
        return None;
    }
    Some(last.to_string())
}

/// Render a relative path as an archive entry name with `/` separators
pub fn to_entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_relative_path() {
        assert_eq!(
            entry_relative_path("a/b/c.txt").unwrap(),
            Some(PathBuf::from("a/b/c.txt"))
        );
        assert_eq!(entry_relative_path("./").unwrap(), None);
        assert!(entry_relative_path("a/../../b").is_err());
        assert!(entry_relative_path("..").is_err());
        assert!(entry_relative_path("/abs").is_err());
    }

    #[test]
    fn test_resolve_entry_path_stays_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_entry_path(dir.path(), "x/y").unwrap().unwrap();
        assert!(resolved.starts_with(dir.path()));
        assert!(matches!(
            resolve_entry_path(dir.path(), "../../evil"),
            Err(Error::PathTraversal(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        assert!(matches!(
            resolve_entry_path(root.path(), "link/file"),
            Err(Error::PathTraversal(_))
        ));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("dir/pkg-1.0.0.tar.zst").as_deref(),
            Some("pkg-1.0.0.tar.zst")
        );
        assert_eq!(sanitize_filename("C:\\tmp\\a.zip").as_deref(), Some("a.zip"));
        assert_eq!(sanitize_filename(".hidden"), None);
        assert_eq!(sanitize_filename("dir/"), None);
    }

    #[test]
    fn test_to_entry_name() {
        assert_eq!(to_entry_name(Path::new("a/b/c")), "a/b/c");
    }
}
