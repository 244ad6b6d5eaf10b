//! KitchenSync - safe, one-way directory mirroring
//!
//! Brings a destination directory tree into alignment with a source
//! tree, archiving any file an update or deletion would otherwise
//! destroy into a per-run `.kitchensync/<timestamp>/` directory
//! alongside it.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod stats;

pub use config::Config;
pub use core::engine::sync;
pub use core::pattern::{glob_match, is_timestamp_like};
pub use error::{ErrorKind, KitchenSyncError, Result};
pub use stats::{Action, Stats, SyncError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
