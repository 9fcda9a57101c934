//! Directory discovery for queue construction

use crate::Result;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Enumerate every directory under `root`, including the root itself.
///
/// With `walk_dirs` off only the root is returned. Symlinked
/// directories are traversed only when `follow_symlinks` is on.
/// Unreadable entries below the root are logged and skipped; failing to
/// enter the root at all is an error the caller decides about.
pub fn discover_dirs(root: &Path, walk_dirs: bool, follow_symlinks: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if walk_dirs { usize::MAX } else { 0 };
    let mut dirs = Vec::new();

    for entry in WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(follow_symlinks)
    {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => dirs.push(entry.path().to_path_buf()),
            Ok(_) => {}
            Err(err) => {
                if dirs.is_empty() {
                    // Could not even enter the root.
                    return Err(err.into());
                }
                warn!(
                    root = %root.display(),
                    error = %err,
                    "skipping unreadable entry during walk"
                );
            }
        }
    }

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("one/deep")).unwrap();
        fs::create_dir(dir.path().join("two")).unwrap();
        fs::write(dir.path().join("file.txt"), b"x").unwrap();
        fs::write(dir.path().join("one/nested.txt"), b"y").unwrap();
        dir
    }

    #[test]
    fn test_walk_finds_all_directories() {
        let dir = tree();
        let mut dirs = discover_dirs(dir.path(), true, false).unwrap();
        dirs.sort();

        let mut expected = vec![
            dir.path().to_path_buf(),
            dir.path().join("one"),
            dir.path().join("one/deep"),
            dir.path().join("two"),
        ];
        expected.sort();
        assert_eq!(dirs, expected);
    }

    #[test]
    fn test_walk_disabled_returns_only_root() {
        let dir = tree();
        let dirs = discover_dirs(dir.path(), false, false).unwrap();
        assert_eq!(dirs, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(discover_dirs(Path::new("/nonexistent/walk/root"), true, false).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_need_opt_in() {
        use std::os::unix::fs::symlink;

        let dir = tree();
        symlink(dir.path().join("two"), dir.path().join("linked")).unwrap();

        let without = discover_dirs(dir.path(), true, false).unwrap();
        assert!(!without.contains(&dir.path().join("linked")));

        let with = discover_dirs(dir.path(), true, true).unwrap();
        assert!(with.contains(&dir.path().join("linked")));
    }
}
