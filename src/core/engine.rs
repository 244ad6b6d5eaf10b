//! Recursive, directory-at-a-time compare-and-act engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::core::directory::{self, Entry};
use crate::core::fileops::{self, ARCHIVE_DIR_NAME};
use crate::core::filter::GlobFilter;
use crate::core::pattern::is_timestamp_like;
use crate::error::{ErrorKind, KitchenSyncError, Result};
use crate::logging::Logger;
use crate::stats::{Action, Stats, SyncError};

/// Runs one full mirror of `config.src_root` onto `config.dst_root`.
/// Only a failure to access either tree's root is fatal; all other
/// per-entry failures are collected and the run continues.
pub fn sync(config: &Config) -> Result<(Stats, Vec<SyncError>)> {
    let filter = GlobFilter::new(config.src_root.clone(), config.exclude_patterns.clone())?;
    let run_timestamp = fileops::archive_timestamp(now_nanos());
    let logger = Logger::new(config.verbosity, config.src_root.clone(), config.dst_root.clone());

    directory::list(&config.src_root).map_err(|_| root_inaccessible(&config.src_root))?;

    if !config.preview {
        fileops::create_dir_all(&config.dst_root)
            .map_err(|_| root_inaccessible(&config.dst_root))?;
    }

    let mut stats = Stats::new();
    let mut errors = Vec::new();

    let mut ctx = Context {
        filter: &filter,
        config,
        logger: &logger,
        run_timestamp: &run_timestamp,
    };

    recurse(&config.src_root, &config.dst_root, &mut ctx, &mut stats, &mut errors);

    Ok((stats, errors))
}

fn root_inaccessible(path: &Path) -> KitchenSyncError {
    KitchenSyncError::RootInaccessible {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "root inaccessible"),
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

struct Context<'a> {
    filter: &'a GlobFilter,
    config: &'a Config,
    logger: &'a Logger,
    run_timestamp: &'a str,
}

fn recurse(
    src_dir: &Path,
    dst_dir: &Path,
    ctx: &mut Context,
    stats: &mut Stats,
    errors: &mut Vec<SyncError>,
) {
    ctx.logger.loading_directory(src_dir);
    let src_entries = match directory::list(src_dir) {
        Ok(entries) => entries,
        Err(e) => {
            record_error(ctx, errors, stats, src_dir, dst_dir, e.kind(), Action::Skip);
            return;
        }
    };

    ctx.logger.loading_directory(dst_dir);
    let dst_entries = directory::list(dst_dir).unwrap_or_default();
    let dst_by_name: HashMap<&str, &Entry> =
        dst_entries.iter().map(|e| (e.name.as_str(), e)).collect();

    let mut seen_names: Vec<&str> = Vec::with_capacity(src_entries.len());

    for s in &src_entries {
        if s.name == ARCHIVE_DIR_NAME {
            continue;
        }
        // Excluded entries are never listed/copied, but a dest entry of
        // the same name is left alone rather than deleted: exclusion
        // means "don't touch", not "remove what's already there".
        seen_names.push(s.name.as_str());
        let src_path = src_dir.join(&s.name);
        if ctx.filter.matches(&src_path) {
            continue;
        }

        let dst_path = dst_dir.join(&s.name);

        if s.is_dir {
            if dst_by_name.get(s.name.as_str()).map(|d| d.is_dir) != Some(true) {
                if !ctx.config.preview {
                    if let Err(e) = fileops::create_dir_all(&dst_path) {
                        record_error(ctx, errors, stats, &src_path, &dst_path, e.kind(), Action::CreateDir);
                        continue;
                    }
                }
                stats.dirs_created += 1;
            }
            recurse(&src_path, &dst_path, ctx, stats, errors);
            continue;
        }

        if ctx.config.skip_timestamps && is_timestamp_like(&s.name) {
            continue;
        }

        let d = dst_by_name.get(s.name.as_str()).copied();
        let action = decide(s, d, ctx.config.use_modtime);
        execute(action, s, &src_path, &dst_path, ctx, stats, errors);
    }

    for d in &dst_entries {
        if d.name == ARCHIVE_DIR_NAME || seen_names.contains(&d.name.as_str()) {
            continue;
        }
        let dst_path = dst_dir.join(&d.name);
        delete_entry(&dst_path, ctx, stats, errors);
    }
}

/// Input: source Entry `s` (always a file, never null), dest Entry `d`
/// (possibly absent). `use_modtime = false` only disables the mtime
/// tiebreaker; it never forces a copy.
fn decide(s: &Entry, d: Option<&Entry>, use_modtime: bool) -> Action {
    match d {
        None => Action::Copy,
        Some(d) if s.size != d.size => Action::Update,
        Some(d) if use_modtime && s.mtime > d.mtime => Action::Update,
        Some(_) => Action::Skip,
    }
}

fn execute(
    action: Action,
    s: &Entry,
    src_path: &Path,
    dst_path: &Path,
    ctx: &mut Context,
    stats: &mut Stats,
    errors: &mut Vec<SyncError>,
) {
    match action {
        Action::Copy => {
            ctx.logger.copying(src_path);
            if ctx.config.preview {
                stats.files_copied += 1;
                return;
            }
            match do_copy(src_path, dst_path, s.size, None, ctx) {
                Ok(()) => stats.files_copied += 1,
                Err(kind) => record_error(ctx, errors, stats, src_path, dst_path, kind, action),
            }
        }
        Action::Update => {
            ctx.logger.moving_to_archive(dst_path);
            let archived = if ctx.config.preview {
                None
            } else {
                match fileops::archive(dst_path, ctx.run_timestamp) {
                    Ok(path) => Some(path),
                    Err(e) if e.kind() == ErrorKind::NotFound => None,
                    Err(e) => {
                        record_error(ctx, errors, stats, src_path, dst_path, e.kind(), action);
                        return;
                    }
                }
            };

            ctx.logger.copying(src_path);
            if ctx.config.preview {
                stats.files_updated += 1;
                return;
            }
            match do_copy(src_path, dst_path, s.size, archived.as_deref(), ctx) {
                Ok(()) => stats.files_updated += 1,
                Err(kind) => record_error(ctx, errors, stats, src_path, dst_path, kind, action),
            }
        }
        Action::Skip => {
            stats.files_unchanged += 1;
        }
        Action::Delete | Action::CreateDir => {
            // handled by delete_entry / the directory-entry branch above
        }
    }
}

fn do_copy(
    src_path: &Path,
    dst_path: &Path,
    expected_size: u64,
    archived_from: Option<&Path>,
    ctx: &Context,
) -> std::result::Result<(), ErrorKind> {
    fileops::copy(src_path, dst_path, ctx.config.abort_timeout_seconds)
        .map_err(|e| e.kind())?;

    match fileops::verify_and_rollback(dst_path, expected_size, archived_from) {
        Ok(None) => Ok(()),
        Ok(Some(kind)) => Err(kind),
        Err(e) => Err(e.kind()),
    }
}

fn delete_entry(
    dst_path: &Path,
    ctx: &mut Context,
    stats: &mut Stats,
    errors: &mut Vec<SyncError>,
) {
    ctx.logger.moving_to_archive(dst_path);
    if ctx.config.preview {
        stats.files_deleted += 1;
        return;
    }
    match fileops::archive(dst_path, ctx.run_timestamp) {
        Ok(_) => stats.files_deleted += 1,
        Err(e) if e.kind() == ErrorKind::NotFound => stats.files_deleted += 1,
        Err(e) => {
            record_error(ctx, errors, stats, dst_path, dst_path, e.kind(), Action::Delete);
        }
    }
}

fn record_error(
    ctx: &Context,
    errors: &mut Vec<SyncError>,
    stats: &mut Stats,
    source_path: &Path,
    dest_path: &Path,
    kind: ErrorKind,
    action: Action,
) {
    ctx.logger.error(op_name(action), source_path, &kind);
    stats.errors += 1;
    errors.push(SyncError {
        source_path: source_path.to_path_buf(),
        dest_path: dest_path.to_path_buf(),
        kind,
        action,
    });
}

fn op_name(action: Action) -> &'static str {
    match action {
        Action::Copy => "copy",
        Action::Update => "update",
        Action::Delete => "delete",
        Action::CreateDir => "mkdir",
        Action::Skip => "skip",
    }
}
