//! Engine configuration and an optional TOML overlay for CLI defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{KitchenSyncError, Result};

/// Read-only input to the Engine for a single sync call.
#[derive(Debug, Clone)]
pub struct Config {
    pub src_root: PathBuf,
    pub dst_root: PathBuf,
    pub preview: bool,
    pub exclude_patterns: Vec<String>,
    pub skip_timestamps: bool,
    pub use_modtime: bool,
    pub verbosity: u8,
    pub abort_timeout_seconds: u64,
}

impl Config {
    /// Fills every field but the two roots with the spec's documented
    /// defaults.
    pub fn new(src_root: PathBuf, dst_root: PathBuf) -> Self {
        Config {
            src_root,
            dst_root,
            preview: false,
            exclude_patterns: Vec::new(),
            skip_timestamps: false,
            use_modtime: false,
            verbosity: 0,
            abort_timeout_seconds: 0,
        }
    }
}

/// Optional on-disk overlay, loaded from a `--config FILE` flag.
/// Only ever supplies defaults; any conflicting CLI flag wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub verbosity: Option<u8>,
    #[serde(default)]
    pub skip_timestamps: Option<bool>,
    #[serde(default)]
    pub use_modtime: Option<bool>,
    #[serde(default)]
    pub abort_timeout_seconds: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| KitchenSyncError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Layers this file's values onto `config`, leaving fields `config`
    /// already carries untouched where the file is silent.
    pub fn apply_to(&self, config: &mut Config) {
        if !self.exclude.is_empty() {
            let mut merged = self.exclude.clone();
            merged.append(&mut config.exclude_patterns);
            config.exclude_patterns = merged;
        }
        if let Some(v) = self.verbosity {
            config.verbosity = v;
        }
        if let Some(v) = self.skip_timestamps {
            config.skip_timestamps = v;
        }
        if let Some(v) = self.use_modtime {
            config.use_modtime = v;
        }
        if let Some(v) = self.abort_timeout_seconds {
            config.abort_timeout_seconds = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_documented_defaults() {
        let config = Config::new(PathBuf::from("/src"), PathBuf::from("/dst"));
        assert!(!config.preview);
        assert!(config.exclude_patterns.is_empty());
        assert!(!config.skip_timestamps);
        assert!(!config.use_modtime);
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.abort_timeout_seconds, 0);
    }

    #[test]
    fn config_file_overlays_exclude_and_verbosity() {
        let file = ConfigFile {
            exclude: vec!["*.tmp".to_string()],
            verbosity: Some(2),
            ..Default::default()
        };
        let mut config = Config::new(PathBuf::from("/src"), PathBuf::from("/dst"));
        file.apply_to(&mut config);
        assert_eq!(config.exclude_patterns, vec!["*.tmp".to_string()]);
        assert_eq!(config.verbosity, 2);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "not = [valid").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }
}
