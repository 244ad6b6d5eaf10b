//! Returns one directory's children as a single owned batch, via a
//! platform-specific fast path.

use std::fs;
use std::path::Path;

use crate::error::{KitchenSyncError, Result};

/// The minimal per-child metadata record. Owned by the batch that
/// produced it; names never contain a path separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub size: u64,
    pub mtime: i64,
    pub is_dir: bool,
}

/// Lists `dir`'s immediate children, sorted byte-lexicographically by
/// name. Symbolic links are skipped entirely (the only natural source
/// of traversal cycles).
pub fn list(dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = list_impl(dir)?;
    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    Ok(entries)
}

#[cfg(not(windows))]
fn list_impl(dir: &Path) -> Result<Vec<Entry>> {
    let _span = tracing::debug_span!("list_directory", dir = %dir.display()).entered();
    let read_dir = fs::read_dir(dir).map_err(KitchenSyncError::Io)?;
    let mut entries = Vec::new();
    for dirent in read_dir {
        let dirent = match dirent {
            Ok(d) => d,
            Err(_) => continue,
        };
        let name = dirent.file_name().to_string_lossy().into_owned();

        let symlink_meta = match dirent.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        if symlink_meta.file_type().is_symlink() {
            continue;
        }

        if symlink_meta.is_dir() {
            entries.push(Entry {
                name,
                size: 0,
                mtime: mtime_secs(&symlink_meta).unwrap_or(0),
                is_dir: true,
            });
            continue;
        }

        let stat = match fs::metadata(dirent.path()) {
            Ok(m) => m,
            Err(_) => {
                entries.push(Entry {
                    name,
                    size: 0,
                    mtime: 0,
                    is_dir: false,
                });
                continue;
            }
        };
        entries.push(Entry {
            name,
            size: stat.len(),
            mtime: mtime_secs(&stat).unwrap_or(0),
            is_dir: false,
        });
    }
    Ok(entries)
}

#[cfg(not(windows))]
fn mtime_secs(meta: &fs::Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

#[cfg(windows)]
fn list_impl(dir: &Path) -> Result<Vec<Entry>> {
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Storage::FileSystem::{FindClose, FindFirstFileW, WIN32_FIND_DATAW};

    let _span = tracing::debug_span!("list_directory_win32", dir = %dir.display()).entered();

    let pattern = {
        let mut s = dir.as_os_str().to_os_string();
        s.push("\\*");
        s
    };
    let mut wide: Vec<u16> = pattern.encode_wide().collect();
    wide.push(0);

    let mut find_data = WIN32_FIND_DATAW::default();
    let handle = unsafe { FindFirstFileW(PCWSTR(wide.as_ptr()), &mut find_data) }
        .map_err(|e| KitchenSyncError::Io(std::io::Error::from_raw_os_error(e.code().0)))?;

    let mut entries = Vec::new();
    let result = collect_entries(handle, find_data, &mut entries);
    unsafe {
        let _ = FindClose(handle);
    }
    result?;
    Ok(entries)
}

#[cfg(windows)]
fn collect_entries(
    handle: windows::Win32::Foundation::HANDLE,
    mut find_data: windows::Win32::Storage::FileSystem::WIN32_FIND_DATAW,
    entries: &mut Vec<Entry>,
) -> Result<()> {
    use windows::Win32::Storage::FileSystem::FindNextFileW;

    loop {
        push_entry(&find_data, entries);
        let ok = unsafe { FindNextFileW(handle, &mut find_data) };
        if ok.is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(windows)]
fn push_entry(
    find_data: &windows::Win32::Storage::FileSystem::WIN32_FIND_DATAW,
    entries: &mut Vec<Entry>,
) {
    use windows::Win32::Storage::FileSystem::{FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_REPARSE_POINT};

    let name = decode_wide(&find_data.cFileName);
    if name == "." || name == ".." {
        return;
    }
    let attrs = find_data.dwFileAttributes;
    if attrs & FILE_ATTRIBUTE_REPARSE_POINT.0 != 0 {
        return;
    }
    let is_dir = attrs & FILE_ATTRIBUTE_DIRECTORY.0 != 0;
    let size = if is_dir {
        0
    } else {
        ((find_data.nFileSizeHigh as u64) << 32) | find_data.nFileSizeLow as u64
    };
    let mtime = filetime_to_unix_secs(find_data.ftLastWriteTime);
    entries.push(Entry {
        name,
        size,
        mtime,
        is_dir,
    });
}

#[cfg(windows)]
fn decode_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[cfg(windows)]
fn filetime_to_unix_secs(ft: windows::Win32::Foundation::FILETIME) -> i64 {
    let ticks = ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64;
    let secs_since_1601 = ticks / 10_000_000;
    secs_since_1601 as i64 - 11_644_473_600
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;

    #[test]
    fn lists_children_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("b.txt")).unwrap();
        File::create(dir.path().join("a.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let entries = list(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
    }

    #[test]
    fn directory_entry_has_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let entries = list(dir.path()).unwrap();
        let sub = entries.iter().find(|e| e.name == "sub").unwrap();
        assert!(sub.is_dir);
        assert_eq!(sub.size, 0);
    }

    #[test]
    fn file_entry_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join("a.txt")).unwrap();
        f.write_all(b"hello").unwrap();
        let entries = list(dir.path()).unwrap();
        let a = entries.iter().find(|e| e.name == "a.txt").unwrap();
        assert_eq!(a.size, 5);
        assert!(!a.is_dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("real.txt")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();
        let entries = list(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"real.txt"));
        assert!(!names.contains(&"link.txt"));
    }

    #[test]
    fn missing_directory_is_root_inaccessible() {
        let result = list(Path::new("/does/not/exist/anywhere"));
        assert!(result.is_err());
    }
}
