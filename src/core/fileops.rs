//! Archive-move, copy-with-watchdog, directory creation, and archive
//! timestamp formatting.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::{ErrorKind, KitchenSyncError, Result};

pub const ARCHIVE_DIR_NAME: &str = ".kitchensync";

/// Formats as `YYYY-MM-DD_HH-MM-SS.mmm` — exactly 23 bytes. Windows
/// disallows `:` in file names, so `-` separates hour/minute/second.
pub fn archive_timestamp(nanos: i64) -> String {
    let secs = nanos.div_euclid(1_000_000_000);
    let subnanos = nanos.rem_euclid(1_000_000_000) as u32;
    let dt: DateTime<Utc> = DateTime::from_timestamp(secs, subnanos)
        .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap());
    format!(
        "{:04}-{:02}-{:02}_{:02}-{:02}-{:02}.{:03}",
        dt.format("%Y").to_string().parse::<i32>().unwrap_or(1970),
        dt.format("%m").to_string().parse::<u32>().unwrap_or(1),
        dt.format("%d").to_string().parse::<u32>().unwrap_or(1),
        dt.format("%H").to_string().parse::<u32>().unwrap_or(0),
        dt.format("%M").to_string().parse::<u32>().unwrap_or(0),
        dt.format("%S").to_string().parse::<u32>().unwrap_or(0),
        dt.timestamp_subsec_millis(),
    )
}

/// Moves `abs_path` into `dirname(abs_path)/.kitchensync/<timestamp>/`,
/// preserving the leaf name, via a single atomic rename. Never
/// copies-then-deletes.
pub fn archive(abs_path: &Path, timestamp: &str) -> Result<PathBuf> {
    if !abs_path.exists() {
        return Err(KitchenSyncError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", abs_path.display()),
        )));
    }
    let parent = abs_path
        .parent()
        .ok_or_else(|| KitchenSyncError::Io(io::Error::new(io::ErrorKind::InvalidInput, "no parent")))?;
    let leaf = abs_path
        .file_name()
        .ok_or_else(|| KitchenSyncError::Io(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?;

    let archive_dir = parent.join(ARCHIVE_DIR_NAME).join(timestamp);
    fs::create_dir_all(&archive_dir)?;

    let dest = archive_dir.join(leaf);
    fs::rename(abs_path, &dest)?;
    Ok(dest)
}

/// `true` if `path` lies inside an archive directory at any depth (it
/// must never be descended into, compared, deleted, or copied into).
pub fn is_within_archive(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == ARCHIVE_DIR_NAME)
}

#[derive(Debug, Default)]
struct WatchdogState {
    completed: bool,
    failed: bool,
}

/// `timeout_seconds == 0` performs a direct, synchronous copy.
/// Otherwise a worker thread performs the copy while the caller polls
/// a mutex-protected flag pair at ~10ms intervals; on deadline the
/// worker is detached (never interrupted) and `Timeout` is returned.
pub fn copy(src: &Path, dst: &Path, timeout_seconds: u64) -> Result<()> {
    if timeout_seconds == 0 {
        return direct_copy(src, dst);
    }

    let state = Arc::new(Mutex::new(WatchdogState::default()));
    let result = Arc::new(Mutex::new(None::<Result<()>>));

    let worker_state = Arc::clone(&state);
    let worker_result = Arc::clone(&result);
    let src_owned = src.to_path_buf();
    let dst_owned = dst.to_path_buf();
    let handle = thread::spawn(move || {
        let outcome = direct_copy(&src_owned, &dst_owned);
        let mut guard = worker_state.lock().unwrap();
        guard.failed = outcome.is_err();
        guard.completed = true;
        drop(guard);
        *worker_result.lock().unwrap() = Some(outcome);
    });

    let deadline = Instant::now() + Duration::from_secs(timeout_seconds);
    loop {
        {
            let guard = state.lock().unwrap();
            if guard.completed {
                drop(guard);
                let _ = handle.join();
                return result.lock().unwrap().take().unwrap_or(Ok(()));
            }
        }
        if Instant::now() >= deadline {
            // Detach: the kernel call may still be blocked. Interrupting
            // it risks corruption; abandonment is bounded to one thread.
            drop(handle);
            return Err(KitchenSyncError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("copy timed out after {}s", timeout_seconds),
            )));
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn direct_copy(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    preserve_metadata(src, dst)?;
    Ok(())
}

fn preserve_metadata(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::metadata(src)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(meta.permissions().mode());
        fs::set_permissions(dst, perms)?;
    }
    #[cfg(not(unix))]
    {
        fs::set_permissions(dst, meta.permissions())?;
    }

    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    filetime::set_file_mtime(dst, mtime)?;
    Ok(())
}

/// Post-copy size verification. On mismatch, deletes the bad
/// destination and, if `archived_from` is given, reverse-renames it
/// back into place.
pub fn verify_and_rollback(
    dst: &Path,
    expected_size: u64,
    archived_from: Option<&Path>,
) -> Result<Option<ErrorKind>> {
    let actual = fs::metadata(dst).map(|m| m.len()).unwrap_or(u64::MAX);
    if actual == expected_size {
        return Ok(None);
    }
    let _ = fs::remove_file(dst);
    if let Some(archived) = archived_from {
        let _ = fs::rename(archived, dst);
    }
    Ok(Some(ErrorKind::SizeMismatch))
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn timestamp_is_23_bytes() {
        let s = archive_timestamp(1_700_000_000_123_000_000);
        assert_eq!(s.len(), 23);
        assert!(!s.contains(':'));
    }

    #[test]
    fn archive_moves_file_under_kitchensync() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        File::create(&file).unwrap().write_all(b"OLD").unwrap();

        let ts = archive_timestamp(0);
        let archived = archive(&file, &ts).unwrap();

        assert!(!file.exists());
        assert!(archived.exists());
        assert_eq!(std::fs::read_to_string(&archived).unwrap(), "OLD");
        assert!(is_within_archive(&archived));
    }

    #[test]
    fn archive_of_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let err = archive(&missing, "2024-01-01_00-00-00.000").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn copy_direct_preserves_mtime_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        File::create(&src).unwrap().write_all(b"hello").unwrap();

        copy(&src, &dst, 0).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello");

        let src_mtime = fs::metadata(&src).unwrap().modified().unwrap();
        let dst_mtime = fs::metadata(&dst).unwrap().modified().unwrap();
        assert_eq!(src_mtime, dst_mtime);
    }

    #[test]
    fn copy_with_watchdog_succeeds_within_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        File::create(&src).unwrap().write_all(b"hi").unwrap();

        copy(&src, &dst, 5).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hi");
    }

    #[test]
    fn verify_rollback_restores_archived_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("a.txt");
        let archived = dir.path().join("a.old.txt");
        File::create(&dst).unwrap().write_all(b"short").unwrap();
        File::create(&archived).unwrap().write_all(b"original content").unwrap();

        let result = verify_and_rollback(&dst, 999, Some(&archived)).unwrap();
        assert_eq!(result, Some(ErrorKind::SizeMismatch));
        assert!(!archived.exists());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "original content");
    }
}
