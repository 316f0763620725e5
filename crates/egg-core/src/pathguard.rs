//! Path normalization and confinement.
//!
//! Every boundary conversion between externally supplied path strings and
//! filesystem paths goes through here. [`normalize`] confines a relative path
//! to a root directory, resolving symlinks for prefixes that exist on disk
//! and reducing the rest lexically. [`is_safe_archive_path`] is the pure
//! check applied to every archive entry name before any I/O.

use std::path::{Component, Path, PathBuf};

use crate::errors::{EggError, EggResult};

fn guard_err(path: &Path, reason: impl Into<String>) -> EggError {
    EggError::Path {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Normalize `path` against `root` and prove containment.
///
/// Fails if `path` is absolute, or if the resolution (symbolic for existing
/// prefixes, lexical for the rest) leaves `root`. Returns the POSIX form of
/// the resolved path relative to `root`.
pub fn normalize(root: &Path, path: &Path) -> EggResult<String> {
    if path.is_absolute() {
        return Err(guard_err(path, "absolute paths are not allowed"));
    }

    let root = std::fs::canonicalize(root).map_err(|e| EggError::io(root, e))?;
    let mut resolved = root.clone();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(guard_err(path, "path escapes the containment root"));
                }
            }
            Component::Normal(part) => {
                resolved.push(part);
                // Resolve symlinks as soon as the prefix exists on disk.
                if let Ok(real) = std::fs::canonicalize(&resolved) {
                    resolved = real;
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(guard_err(path, "absolute paths are not allowed"));
            }
        }
    }

    let rel = resolved
        .strip_prefix(&root)
        .map_err(|_| guard_err(path, "path escapes the containment root"))?;
    if rel.as_os_str().is_empty() {
        return Err(guard_err(path, "path resolves to the containment root itself"));
    }
    Ok(to_posix(rel))
}

/// Render a relative path with forward slashes.
pub fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether an archive entry name is safe to touch.
///
/// True iff the name is non-empty, relative, free of `..` segments (under
/// either separator) and carries no Windows drive prefix.
pub fn is_safe_archive_path(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') || name.starts_with('\\') {
        return false;
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return false;
    }
    name.split(['/', '\\']).all(|segment| segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalizes_relative_path() {
        let root = TempDir::new().unwrap();
        let rel = normalize(root.path(), Path::new("a/b/hello.py")).unwrap();
        assert_eq!(rel, "a/b/hello.py");
    }

    #[test]
    fn collapses_dot_and_interior_parent_segments() {
        let root = TempDir::new().unwrap();
        let rel = normalize(root.path(), Path::new("./a/../b/hello.py")).unwrap();
        assert_eq!(rel, "b/hello.py");
    }

    #[test]
    fn rejects_absolute_path() {
        let root = TempDir::new().unwrap();
        let err = normalize(root.path(), Path::new("/etc/passwd")).unwrap_err();
        assert_eq!(err.reason_code(), "E_PATH");
    }

    #[test]
    fn rejects_escape() {
        let root = TempDir::new().unwrap();
        let err = normalize(root.path(), Path::new("../evil.py")).unwrap_err();
        assert_eq!(err.reason_code(), "E_PATH");
    }

    #[test]
    fn rejects_symlink_escape() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        let err = normalize(root.path(), Path::new("link/hello.py")).unwrap_err();
        assert_eq!(err.reason_code(), "E_PATH");
    }

    #[test]
    fn normalization_fixed_point() {
        let root = TempDir::new().unwrap();
        let once = normalize(root.path(), Path::new("a/./b/../c.py")).unwrap();
        let twice = normalize(root.path(), Path::new(&once)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn archive_path_safety() {
        assert!(is_safe_archive_path("hello.py"));
        assert!(is_safe_archive_path("a/b/c.txt"));
        assert!(is_safe_archive_path("runtime/python_3.11.img"));

        assert!(!is_safe_archive_path(""));
        assert!(!is_safe_archive_path("/etc/passwd"));
        assert!(!is_safe_archive_path("\\server\\share"));
        assert!(!is_safe_archive_path("../evil.py"));
        assert!(!is_safe_archive_path("a/../../b"));
        assert!(!is_safe_archive_path("a\\..\\b"));
        assert!(!is_safe_archive_path("C:evil"));
        assert!(!is_safe_archive_path("c:/windows"));
    }
}
