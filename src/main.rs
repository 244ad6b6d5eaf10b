use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use kitchensync::config::{Config, ConfigFile};
use kitchensync::logging;

/// Safe, one-way directory mirroring with archive-before-overwrite semantics.
#[derive(Parser, Debug)]
#[command(name = "kitchensync", version, about)]
struct Cli {
    /// Source directory tree.
    source: PathBuf,

    /// Destination directory tree (created if absent).
    destination: PathBuf,

    /// Preview mode: report what would happen, perform no mutating operation.
    /// Defaults to N, or the config file's value, unless given here.
    #[arg(short = 'p', long, value_name = "Y|N")]
    preview: Option<YesNo>,

    /// Skip files whose name looks like a timestamp.
    /// Defaults to N, or the config file's value, unless given here.
    #[arg(short = 't', long, value_name = "Y|N")]
    skip_timestamps: Option<YesNo>,

    /// Let modification time break ties when sizes are equal.
    /// Defaults to N, or the config file's value, unless given here.
    #[arg(short = 'm', long, value_name = "Y|N")]
    use_modtime: Option<YesNo>,

    /// 0 = silent, 1 = per-operation log + summary, 2 = also log directory loads.
    /// Defaults to 0, or the config file's value, unless given here.
    #[arg(short = 'v', long, value_name = "0|1|2")]
    verbosity: Option<u8>,

    /// Abandon a stalled copy after this many seconds (0 disables the watchdog).
    /// Defaults to 0, or the config file's value, unless given here.
    #[arg(short = 'a', long, value_name = "SECONDS")]
    abort_timeout_seconds: Option<u64>,

    /// Exclude paths matching PATTERN (glob, relative to source root). Repeatable.
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Load exclude patterns and defaults from a TOML file; CLI flags win on conflict.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum YesNo {
    #[value(name = "Y")]
    Y,
    #[value(name = "N")]
    N,
}

impl YesNo {
    fn as_bool(self) -> bool {
        self == YesNo::Y
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("kitchensync: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_tracing();

    let src_root = std::fs::canonicalize(&cli.source)
        .with_context(|| format!("source directory not accessible: {}", cli.source.display()))?;
    let dst_root = resolve_destination(&cli.destination)
        .with_context(|| format!("destination path not resolvable: {}", cli.destination.display()))?;

    let mut config = Config::new(src_root, dst_root);

    // Config file first, as defaults; CLI flags below overlay only the
    // values the user actually passed, so they win on conflict.
    if let Some(path) = &cli.config {
        let file = ConfigFile::load(path)
            .with_context(|| format!("failed to load config file: {}", path.display()))?;
        file.apply_to(&mut config);
    }

    if let Some(v) = cli.preview {
        config.preview = v.as_bool();
    }
    if let Some(v) = cli.skip_timestamps {
        config.skip_timestamps = v.as_bool();
    }
    if let Some(v) = cli.use_modtime {
        config.use_modtime = v.as_bool();
    }
    if let Some(v) = cli.verbosity {
        config.verbosity = v;
    }
    if let Some(v) = cli.abort_timeout_seconds {
        config.abort_timeout_seconds = v;
    }
    let mut exclude = cli.exclude;
    config.exclude_patterns.append(&mut exclude);

    let (stats, errors) = kitchensync::sync(&config)?;

    println!(
        "copied={} updated={} deleted={} dirs_created={} unchanged={} errors={}",
        stats.files_copied,
        stats.files_updated,
        stats.files_deleted,
        stats.dirs_created,
        stats.files_unchanged,
        errors.len(),
    );

    if errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Pure path resolution: the destination need not exist yet, so this
/// cannot use `canonicalize`, which requires every component to exist.
fn resolve_destination(path: &std::path::Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir().context("cannot read current directory")?;
        Ok(cwd.join(path))
    }
}
