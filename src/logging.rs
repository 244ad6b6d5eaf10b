//! Diagnostic logging (`tracing`) plus the spec-mandated stdout line
//! emitter, which is a distinct, directly-specified output contract and
//! not a `tracing` layer.

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the ambient `tracing-subscriber` stack. Controlled by
/// `RUST_LOG`, falling back to `kitchensync=info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kitchensync={}", Level::INFO)));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
pub fn init_test_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = fmt()
            .with_env_filter(EnvFilter::new("kitchensync=debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Emits the per-operation stdout lines described in the external
/// interfaces: `[YYYY-MM-DD_HH:MM:SS] <action>: <path>`.
pub struct Logger {
    verbosity: u8,
    src_root: PathBuf,
    dst_root: PathBuf,
}

impl Logger {
    pub fn new(verbosity: u8, src_root: PathBuf, dst_root: PathBuf) -> Self {
        Logger {
            verbosity,
            src_root,
            dst_root,
        }
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d_%H:%M:%S").to_string()
    }

    fn display_relative(&self, path: &Path, root: &Path) -> String {
        path.strip_prefix(root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    pub fn copying(&self, src_path: &Path) {
        if self.verbosity >= 1 {
            let rel = self.display_relative(src_path, &self.src_root);
            println!("[{}] copying: {}", Self::timestamp(), rel);
        }
    }

    pub fn moving_to_archive(&self, dst_path: &Path) {
        if self.verbosity >= 1 {
            let rel = self.display_relative(dst_path, &self.dst_root);
            println!("[{}] moving to .kitchensync: {}", Self::timestamp(), rel);
        }
    }

    pub fn loading_directory(&self, dir: &Path) {
        if self.verbosity >= 2 {
            println!("[{}] loading directory: {}", Self::timestamp(), dir.display());
        }
    }

    pub fn error(&self, op: &str, path: &Path, kind: &crate::error::ErrorKind) {
        if self.verbosity >= 1 {
            println!(
                "[{}] error: {} '{}': {}",
                Self::timestamp(),
                op,
                path.display(),
                kind
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn relative_display_strips_root() {
        let logger = Logger::new(1, PathBuf::from("/src"), PathBuf::from("/dst"));
        assert_eq!(
            logger.display_relative(Path::new("/src/sub/a.txt"), Path::new("/src")),
            "sub/a.txt"
        );
    }

    #[test]
    fn verbosity_zero_is_stored() {
        let logger = Logger::new(0, PathBuf::from("/src"), PathBuf::from("/dst"));
        assert_eq!(logger.verbosity, 0);
    }

    #[test]
    fn error_kind_display_is_used_verbatim() {
        assert_eq!(ErrorKind::Timeout.to_string(), "Timeout");
    }
}
