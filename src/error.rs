//! Error types for the synchronization core.
//!
//! Mirrors the split used throughout this crate's ancestor: a concrete
//! error type for "this operation failed right now" (`KitchenSyncError`)
//! and a coarser classification (`ErrorKind`) attached to each
//! [`crate::stats::SyncError`] for reporting.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KitchenSyncError>;

/// Fatal or structural failures: things that stop a whole run, or a
/// single pattern/config evaluation, rather than a single entry.
#[derive(Error, Debug)]
pub enum KitchenSyncError {
    #[error("bad pattern '{pattern}': {reason}")]
    BadPattern { pattern: String, reason: String },

    #[error("root inaccessible: {path}: {source}")]
    RootInaccessible { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl KitchenSyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KitchenSyncError::BadPattern { .. } => ErrorKind::BadPattern,
            KitchenSyncError::RootInaccessible { .. } => ErrorKind::RootInaccessible,
            KitchenSyncError::Io(e) => ErrorKind::from_io(e),
            KitchenSyncError::Config(_) => ErrorKind::Other,
        }
    }
}

/// Coarse classification of a per-entry failure, attached to a
/// `SyncError` record and used for both the stdout error line and the
/// end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    DiskFull,
    QuotaExceeded,
    Timeout,
    SizeMismatch,
    BadPattern,
    RootInaccessible,
    Other,
}

impl ErrorKind {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => Self::from_raw_os_error(err).unwrap_or(ErrorKind::Other),
        }
    }

    // Disk-full / quota conditions often surface only as a raw OS error
    // code rather than a distinguished io::ErrorKind, on both POSIX
    // (ENOSPC/EDQUOT) and Windows (ERROR_DISK_FULL/ERROR_DISK_QUOTA_EXCEEDED).
    fn from_raw_os_error(err: &io::Error) -> Option<Self> {
        let code = err.raw_os_error()?;
        #[cfg(unix)]
        {
            const ENOSPC: i32 = 28;
            const EDQUOT: i32 = 122;
            if code == ENOSPC {
                return Some(ErrorKind::DiskFull);
            }
            if code == EDQUOT {
                return Some(ErrorKind::QuotaExceeded);
            }
        }
        #[cfg(windows)]
        {
            const ERROR_DISK_FULL: i32 = 112;
            const ERROR_DISK_QUOTA_EXCEEDED: i32 = 1295;
            if code == ERROR_DISK_FULL {
                return Some(ErrorKind::DiskFull);
            }
            if code == ERROR_DISK_QUOTA_EXCEEDED {
                return Some(ErrorKind::QuotaExceeded);
            }
        }
        #[allow(unreachable_code)]
        {
            let _ = code;
            None
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AccessDenied => "AccessDenied",
            ErrorKind::DiskFull => "DiskFull",
            ErrorKind::QuotaExceeded => "QuotaExceeded",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::SizeMismatch => "SizeMismatch",
            ErrorKind::BadPattern => "BadPattern",
            ErrorKind::RootInaccessible => "RootInaccessible",
            ErrorKind::Other => "Other",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_from_io() {
        let err = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_io(&err), ErrorKind::NotFound);
    }

    #[test]
    fn permission_denied_maps_from_io() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(ErrorKind::from_io(&err), ErrorKind::AccessDenied);
    }

    #[test]
    fn display_matches_log_format() {
        assert_eq!(ErrorKind::SizeMismatch.to_string(), "SizeMismatch");
        assert_eq!(ErrorKind::RootInaccessible.to_string(), "RootInaccessible");
    }

    #[test]
    fn bad_pattern_kind_round_trips() {
        let err = KitchenSyncError::BadPattern {
            pattern: "[abc".into(),
            reason: "unclosed character class".into(),
        };
        assert_eq!(err.kind(), ErrorKind::BadPattern);
    }
}
