//! Destination key derivation
//!
//! Builds the object key for one source file from the profile's naming
//! rules. Derivation is a pure function of its inputs: the same file,
//! root, and configuration always produce the same key.

use crate::profile::{NamingConfig, NamingMode};
use std::path::Path;

/// Characters object stores commonly reject in keys
const STRIPPED: &[char] = &[':', '*', '?', '"', '<', '>', '|'];

/// Normalize one key component: trim whitespace, drop rejected
/// characters, collapse separator runs, trim edge slashes.
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_slash = false;
    for ch in raw.trim().chars() {
        if STRIPPED.contains(&ch) {
            continue;
        }
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out.trim_matches('/').to_string()
}

fn trim_leading_slash(s: &str) -> &str {
    s.trim_start_matches('/')
}

/// Remove `prefix` from the front of `origin`, then any leading slash.
fn strip_prefix_str(origin: &str, prefix: &str) -> String {
    let stripped = origin.strip_prefix(prefix).unwrap_or(origin);
    trim_leading_slash(stripped).to_string()
}

fn join(path: &str, base: &str) -> String {
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{path}/{base}")
    }
}

/// Derive the destination key for one file.
///
/// `search_root` is the directory root the file was discovered under;
/// standalone files pass `None` and keep only the path prefix. In
/// `Relative` mode the directory part is rebuilt relative to the search
/// root (keeping the root's own name unless `omit_root_dir` is set); in
/// `Absolute` mode the full origin directory is mirrored under the path
/// prefix without component sanitization.
pub fn derive(
    file_name: &str,
    origin_dir: &Path,
    search_root: Option<&Path>,
    naming: &NamingConfig,
) -> String {
    let base_key = sanitize(&format!("{}{}", naming.name_prefix, file_name));

    let Some(root) = search_root else {
        let path = sanitize(&naming.path_prefix);
        return join(&path, &base_key);
    };

    let origin = origin_dir.to_string_lossy();
    let path = match naming.mode {
        NamingMode::Relative => {
            let dir_part = if naming.omit_root_dir {
                strip_prefix_str(&origin, &root.to_string_lossy())
            } else {
                // Keep the root directory's own name: strip only the
                // segments above it.
                let parent = root
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                strip_prefix_str(&origin, &parent)
            };
            sanitize(&format!("{}/{}", naming.path_prefix, dir_part))
        }
        NamingMode::Absolute => {
            let full = format!("{}/{}", naming.path_prefix, trim_leading_slash(&origin));
            full.trim_matches('/').to_string()
        }
    };
    join(&path, &base_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming(mode: NamingMode, name_prefix: &str, path_prefix: &str, omit_root_dir: bool) -> NamingConfig {
        NamingConfig {
            mode,
            name_prefix: name_prefix.to_string(),
            path_prefix: path_prefix.to_string(),
            omit_root_dir,
        }
    }

    #[test]
    fn test_relative_with_omitted_root() {
        let cfg = naming(NamingMode::Relative, "pre-", "pre2", true);
        let key = derive("d.txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "pre2/c/pre-d.txt");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let cfg = naming(NamingMode::Relative, "pre-", "pre2", true);
        let first = derive("d.txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        let second = derive("d.txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(first, second);
    }

    #[test]
    fn test_relative_keeps_root_name() {
        let cfg = naming(NamingMode::Relative, "", "", false);
        let key = derive("d.txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "b/c/d.txt");
    }

    #[test]
    fn test_file_directly_under_root() {
        let cfg = naming(NamingMode::Relative, "", "", true);
        let key = derive("d.txt", Path::new("/a/b"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "d.txt");
    }

    #[test]
    fn test_absolute_mirrors_origin_directory() {
        let cfg = naming(NamingMode::Absolute, "", "pre2", false);
        let key = derive("d.txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "pre2/a/b/c/d.txt");
    }

    #[test]
    fn test_absolute_without_path_prefix() {
        let cfg = naming(NamingMode::Absolute, "", "", false);
        let key = derive("d.txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "a/b/c/d.txt");
    }

    #[test]
    fn test_standalone_file_uses_only_path_prefix() {
        let cfg = naming(NamingMode::Relative, "pre-", "archive", false);
        let key = derive("notes.txt", Path::new("/home/user"), None, &cfg);
        assert_eq!(key, "archive/pre-notes.txt");

        let bare = naming(NamingMode::Relative, "", "", false);
        assert_eq!(derive("notes.txt", Path::new("/home/user"), None, &bare), "notes.txt");
    }

    #[test]
    fn test_sanitize_strips_rejected_characters() {
        let cfg = naming(NamingMode::Relative, "a:b*c?", "p<re>|fix", true);
        let key = derive("d\".txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "prefix/c/abcd.txt");
    }

    #[test]
    fn test_sanitize_collapses_separator_runs() {
        let cfg = naming(NamingMode::Relative, "", "pre2//sub/", true);
        let key = derive("d.txt", Path::new("/a/b/c"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "pre2/sub/c/d.txt");
    }

    #[test]
    fn test_no_edge_slashes_in_final_key() {
        let cfg = naming(NamingMode::Relative, "", "/wrapped/", true);
        let key = derive("d.txt", Path::new("/a/b"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "wrapped/d.txt");
        assert!(!key.starts_with('/'));
        assert!(!key.ends_with('/'));
    }

    #[test]
    fn test_sanitize_trims_whitespace() {
        let cfg = naming(NamingMode::Relative, "", "  spaced  ", true);
        let key = derive("d.txt", Path::new("/a/b"), Some(Path::new("/a/b")), &cfg);
        assert_eq!(key, "spaced/d.txt");
    }
}
