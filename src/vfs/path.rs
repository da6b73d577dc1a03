//! Absolute path helpers. Every store key goes through [`normalize`].

use crate::error::{FsError, FsResult};

/// Root directory key.
pub const ROOT: &str = "/";

/// Canonical form of an absolute path.
///
/// Collapses repeated and trailing slashes. Relative paths, `.`/`..`
/// components and embedded NULs are rejected.
pub fn normalize(path: &str) -> FsResult<String> {
    if !path.starts_with('/') || path.contains('\0') {
        return Err(FsError::InvalidArgument);
    }

    let mut out = String::with_capacity(path.len());
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            return Err(FsError::InvalidArgument);
        }
        out.push('/');
        out.push_str(component);
    }

    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Parent of a normalized path. The root is its own parent.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

/// Final component of a normalized path (empty for the root).
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Append a single component to a normalized directory path.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// True if `path` equals `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return true;
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Re-root `path` (which lies within `from`) under `to`.
pub fn rebase(path: &str, from: &str, to: &str) -> String {
    if path == from {
        return to.to_string();
    }
    let suffix = if from == ROOT {
        path
    } else {
        &path[from.len()..]
    };
    if to == ROOT {
        suffix.to_string()
    } else {
        format!("{}{}", to, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("//a///b/").unwrap(), "/a/b");
        assert_eq!(normalize("/a").unwrap(), "/a");
        assert!(matches!(normalize("a/b"), Err(FsError::InvalidArgument)));
        assert!(matches!(normalize("/a/../b"), Err(FsError::InvalidArgument)));
        assert!(matches!(normalize("/a/./b"), Err(FsError::InvalidArgument)));
        assert!(matches!(normalize(""), Err(FsError::InvalidArgument)));
    }

    #[test]
    fn test_parent_and_basename() {
        assert_eq!(parent("/"), "/");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/a/b/c"), "/a/b");
        assert_eq!(basename("/a/b/c"), "c");
        assert_eq!(basename("/a"), "a");
        assert_eq!(basename("/"), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "x"), "/x");
        assert_eq!(join("/d", "x"), "/d/x");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("/a/b/c", "/a", "/x"), "/x/b/c");
        assert_eq!(rebase("/a", "/a", "/x/y"), "/x/y");
    }
}
