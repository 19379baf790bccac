use std::path::{Component, Path, PathBuf};

/// Lexically normalizes `path` into an absolute path rooted at `/`.
///
/// Relative paths are taken relative to the root, `.` is dropped and `..`
/// pops a component (never above the root). Names are kept byte-for-byte.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// Returns the final component as a string, or `/` for the root.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_path(Path::new("foo")), PathBuf::from("/foo"));
        assert_eq!(normalize_path(Path::new("./a/b/")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_normalize_parent_dirs() {
        assert_eq!(normalize_path(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("../../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("")), PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_keeps_non_utf8_names_distinct() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = normalize_path(Path::new(OsStr::from_bytes(b"dir/\xff")));
        let b = normalize_path(Path::new(OsStr::from_bytes(b"dir/\xfe")));
        assert_ne!(a, b);
        assert_eq!(a.as_os_str().as_bytes(), b"/dir/\xff");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/a/b")), "b");
        assert_eq!(base_name(Path::new("/")), "/");
    }
}
