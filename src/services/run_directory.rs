//! Allocation of the per-run destination directory.
//!
//! Every run writes into `<root>/<YYYY>/<MM>/<DD>/<NN>`, where `NN` is the
//! first free two-digit counter for that day. The scan is sequential and
//! takes no lock: two runs started at the same moment may pick the same
//! slot.

use crate::errors::{MirrorError, MirrorResult};
use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// The dated parent of all run directories for `today`.
pub fn day_directory(root: &Path, today: NaiveDate) -> PathBuf {
    root.join(format!("{:04}", today.year()))
        .join(format!("{:02}", today.month()))
        .join(format!("{:02}", today.day()))
}

/// Pick and create the first unused run directory for `today`.
///
/// Any existing entry occupies its slot, whether a directory or a stray
/// file. Counters past 99 simply grow a digit.
pub async fn allocate_run_directory(root: &Path, today: NaiveDate) -> MirrorResult<PathBuf> {
    let base = day_directory(root, today);

    let mut counter: u32 = 1;
    let candidate = loop {
        let candidate = base.join(format!("{:02}", counter));
        let taken = fs::try_exists(&candidate)
            .await
            .map_err(|err| MirrorError::filesystem(&candidate, err))?;
        if !taken {
            break candidate;
        }
        debug!("run directory {} already exists", candidate.display());
        counter += 1;
    };

    fs::create_dir_all(&candidate)
        .await
        .map_err(|err| MirrorError::filesystem(&candidate, err))?;

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn first_run_of_the_day_is_01() {
        let root = tempdir().unwrap();
        let dir = allocate_run_directory(root.path(), date(2025, 3, 7)).await.unwrap();

        assert_eq!(dir, root.path().join("2025").join("03").join("07").join("01"));
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn consecutive_runs_count_up() {
        let root = tempdir().unwrap();
        let today = date(2025, 12, 31);

        let mut names = Vec::new();
        for _ in 0..4 {
            let dir = allocate_run_directory(root.path(), today).await.unwrap();
            names.push(dir.file_name().unwrap().to_string_lossy().into_owned());
        }

        assert_eq!(names, ["01", "02", "03", "04"]);
    }

    #[tokio::test]
    async fn gaps_are_filled_first() {
        let root = tempdir().unwrap();
        let today = date(2024, 2, 29);
        let base = day_directory(root.path(), today);
        std::fs::create_dir_all(base.join("01")).unwrap();
        std::fs::create_dir_all(base.join("03")).unwrap();

        let dir = allocate_run_directory(root.path(), today).await.unwrap();
        assert_eq!(dir, base.join("02"));
    }

    #[tokio::test]
    async fn stray_file_occupies_slot() {
        let root = tempdir().unwrap();
        let today = date(2025, 1, 1);
        let base = day_directory(root.path(), today);
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("01"), b"not a directory").unwrap();

        let dir = allocate_run_directory(root.path(), today).await.unwrap();
        assert_eq!(dir, base.join("02"));
    }

    #[tokio::test]
    async fn counter_grows_past_two_digits() {
        let root = tempdir().unwrap();
        let today = date(2025, 6, 15);
        let base = day_directory(root.path(), today);
        for n in 1..=99 {
            std::fs::create_dir_all(base.join(format!("{:02}", n))).unwrap();
        }

        let dir = allocate_run_directory(root.path(), today).await.unwrap();
        assert_eq!(dir, base.join("100"));
    }

    #[tokio::test]
    async fn blocked_root_is_a_filesystem_error() {
        let scratch = tempdir().unwrap();
        let root = scratch.path().join("root-is-a-file");
        std::fs::write(&root, b"x").unwrap();

        let err = allocate_run_directory(&root, date(2025, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Filesystem { .. }));
    }
}
