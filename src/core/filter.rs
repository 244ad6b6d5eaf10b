//! Composes a root directory with an ordered pattern list into a
//! stateless exclusion test.

use std::path::{Path, PathBuf};

use crate::core::pattern::glob_match;
use crate::error::{KitchenSyncError, Result};

/// `{root, patterns}` — every call to `matches` is independent; the
/// filter holds no per-path state.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    root: PathBuf,
    patterns: Vec<String>,
}

impl GlobFilter {
    /// Validates every pattern up front so a malformed `-x` argument is
    /// reported as `BadPattern` before traversal begins, not mid-run.
    pub fn new(root: PathBuf, patterns: Vec<String>) -> Result<Self> {
        for pattern in &patterns {
            glob_match(pattern, "").map_err(|e| KitchenSyncError::BadPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(GlobFilter { root, patterns })
    }

    /// True if `absolute_path` lies under `root` and its root-relative
    /// tail matches any pattern.
    pub fn matches(&self, absolute_path: &Path) -> bool {
        let relative = match relative_to(absolute_path, &self.root) {
            Some(r) => r,
            None => return false,
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        self.patterns
            .iter()
            .any(|pattern| glob_match(pattern, &relative).unwrap_or(false))
    }
}

/// Byte-prefix match of the normalized root plus a path separator, then
/// the tail. Returns `None` if `path` does not lie under `root`.
fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(|p| p.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_under_root_with_exclusion_pattern() {
        let filter = GlobFilter::new(PathBuf::from("/src"), vec!["*.tmp".to_string()]).unwrap();
        assert!(filter.matches(Path::new("/src/tmp.tmp")));
        assert!(!filter.matches(Path::new("/src/a.txt")));
    }

    #[test]
    fn outside_root_never_matches() {
        let filter = GlobFilter::new(PathBuf::from("/src"), vec!["*".to_string()]).unwrap();
        assert!(!filter.matches(Path::new("/other/a.txt")));
    }

    #[test]
    fn double_star_pattern_reaches_nested_paths() {
        let filter = GlobFilter::new(PathBuf::from("/src"), vec!["**/*.tmp".to_string()]).unwrap();
        assert!(filter.matches(Path::new("/src/sub/dir/tmp.tmp")));
    }

    #[test]
    fn construction_rejects_bad_pattern() {
        assert!(GlobFilter::new(PathBuf::from("/src"), vec!["[abc".to_string()]).is_err());
    }

    #[test]
    fn empty_pattern_list_never_matches() {
        let filter = GlobFilter::new(PathBuf::from("/src"), vec![]).unwrap();
        assert!(!filter.matches(Path::new("/src/a.txt")));
    }
}
