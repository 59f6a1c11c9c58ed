//! Mapping object keys onto relative filesystem paths.

use crate::errors::KeyError;
use std::path::{Component, Path, PathBuf};

/// Where an object key lands below the run directory.
#[derive(Debug, PartialEq, Eq)]
pub enum LocalTarget {
    /// A regular object, written as a file.
    File(PathBuf),
    /// A `prefix/` placeholder, materialized as a directory.
    Directory(PathBuf),
}

/// Turn an object key into a path relative to the run directory.
///
/// Keys are split on `/`. Empty and `.` segments are dropped, so `a//b`,
/// `a/./b` and `a/b` all land at `a/b` and the last one listed wins. Keys
/// that are absolute, climb with `..`, or contain characters that mean
/// something else to the local filesystem are rejected rather than
/// rewritten.
pub fn resolve_key(key: &str) -> Result<LocalTarget, KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(KeyError::Absolute);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(KeyError::ForbiddenCharacter);
    }

    let mut relative = PathBuf::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(KeyError::ParentTraversal),
            _ => relative.push(segment),
        }
    }

    // A segment like `C:` is a prefix on Windows; only plain names may remain.
    if let Some(bad) = relative
        .components()
        .find(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(KeyError::InvalidSegment(
            bad.as_os_str().to_string_lossy().into_owned(),
        ));
    }

    if key.ends_with('/') {
        return Ok(LocalTarget::Directory(relative));
    }
    if relative.as_os_str().is_empty() {
        return Err(KeyError::Empty);
    }
    Ok(LocalTarget::File(relative))
}

/// Join a resolved relative path onto the destination.
///
/// `relative` must come from [`resolve_key`]; the result always stays
/// below `destination`.
pub fn target_path(destination: &Path, relative: &Path) -> PathBuf {
    let target = destination.join(relative);
    debug_assert!(target.starts_with(destination));
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(p: &str) -> LocalTarget {
        LocalTarget::File(PathBuf::from(p))
    }

    #[test]
    fn plain_and_nested_keys() {
        assert_eq!(resolve_key("a.txt"), Ok(file("a.txt")));
        assert_eq!(resolve_key("dir/sub/c.txt"), Ok(file("dir/sub/c.txt")));
    }

    #[test]
    fn dots_inside_names_are_fine() {
        assert_eq!(resolve_key("v1..2/notes..txt"), Ok(file("v1..2/notes..txt")));
        assert_eq!(resolve_key(".hidden/.env"), Ok(file(".hidden/.env")));
    }

    #[test]
    fn empty_and_current_segments_collapse() {
        assert_eq!(resolve_key("a//./b.txt"), Ok(file("a/b.txt")));
    }

    #[test]
    fn equivalent_spellings_share_a_file() {
        assert_eq!(resolve_key("a//b"), resolve_key("a/b"));
        assert_eq!(resolve_key("a/./b"), resolve_key("a/b"));
    }

    #[test]
    fn traversal_is_rejected() {
        assert_eq!(resolve_key("../../etc/passwd"), Err(KeyError::ParentTraversal));
        assert_eq!(resolve_key("dir/../../x"), Err(KeyError::ParentTraversal));
        assert_eq!(resolve_key("dir/.."), Err(KeyError::ParentTraversal));
    }

    #[test]
    fn absolute_and_odd_keys_are_rejected() {
        assert_eq!(resolve_key("/etc/passwd"), Err(KeyError::Absolute));
        assert_eq!(resolve_key(""), Err(KeyError::Empty));
        assert_eq!(resolve_key("./."), Err(KeyError::Empty));
        assert_eq!(resolve_key("a\\..\\b"), Err(KeyError::ForbiddenCharacter));
        assert_eq!(resolve_key("bad\nname"), Err(KeyError::ForbiddenCharacter));
    }

    #[test]
    fn trailing_slash_is_a_directory() {
        assert_eq!(
            resolve_key("photos/2025/"),
            Ok(LocalTarget::Directory(PathBuf::from("photos/2025")))
        );
    }

    #[test]
    fn target_stays_under_destination() {
        let dest = Path::new("/backups/2025/01/01/01");
        let LocalTarget::File(rel) = resolve_key("dir/b.txt").unwrap() else {
            panic!("expected a file target");
        };
        assert_eq!(target_path(dest, &rel), dest.join("dir/b.txt"));
    }
}
