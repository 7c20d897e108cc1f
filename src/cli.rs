//! Command table + dispatcher: each subcommand is a table entry of
//! {name, argspec, handler}, with a minimal dispatcher and no per-command
//! global state. Each handler below takes its inputs explicitly and
//! returns a `CoreResult`/`anyhow::Result` rather than touching globals,
//! using `clap` derive `Parser`/`Subcommand` and `indicatif` spinners.

use crate::chunk::build_chunks;
use crate::codec;
use crate::config::{self, Config};
use crate::context::RunContext;
use crate::crawler::{self, CrawlOptions, DEFAULT_SKIP_FOLDERS};
use crate::error::CoreError;
use crate::lock;
use crate::logging::Verbosity;
use crate::manifest::{self, ChunkInfo, ChunkStatus, Manifest};
use crate::paths;
use crate::query;
use crate::snippet;
use crate::tombstone;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mneme")]
#[command(version)]
#[command(about = "A local personal search engine")]
pub struct Cli {
    /// Raise the log level to debug.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Lower the log level to error only.
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create directories and the default config.
    Init,
    /// Inspect or mutate the effective configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Crawl configured sources and rebuild the index.
    Index,
    /// Run a ranked keyword query against the index.
    Find {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Permanently delete tombstoned segments.
    Clean,
    /// Print crate and on-disk manifest versions.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Add a source path.
    Add { path: PathBuf },
    /// Remove one source path, or every path with `--all`.
    Remove {
        path: Option<PathBuf>,
        #[arg(long)]
        all: bool,
        /// Skip the interactive confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn verbosity(cli: &Cli) -> Verbosity {
    if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar.set_message(message.to_string());
    bar
}

/// Run the parsed command, returning the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let config_path = paths::config_file();
    let data_dir = paths::data_dir();

    let loaded_config = config::load_config(&config_path);
    let configured_level = loaded_config.as_ref().ok().map(|c| c.logging.level.clone());
    let json_logs = loaded_config.as_ref().map(|c| c.logging.json).unwrap_or(false);
    crate::logging::init(verbosity(&cli), json_logs, configured_level.as_deref());

    match cli.command {
        Command::Init => cmd_init(&config_path, &data_dir),
        Command::Config { action } => cmd_config(&config_path, action),
        Command::Index => cmd_index(&config_path, &data_dir),
        Command::Find { query } => cmd_find(&config_path, &data_dir, &query.join(" ")),
        Command::Clean => cmd_clean(&data_dir),
        Command::Version => cmd_version(&data_dir),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CoreError>().map(|e| e.exit_code()).unwrap_or(1)
}

fn cmd_init(config_path: &PathBuf, data_dir: &PathBuf) -> Result<i32> {
    paths::ensure_data_dirs(data_dir).context("creating data directories")?;
    if !config_path.exists() {
        config::save_config(config_path, &Config::default())?;
        println!("wrote default config to {}", config_path.display());
    } else {
        println!("config already exists at {}", config_path.display());
    }
    println!("initialized data directory at {}", data_dir.display());
    Ok(0)
}

fn cmd_config(config_path: &PathBuf, action: ConfigAction) -> Result<i32> {
    let mut cfg = config::load_config(config_path)?;
    match action {
        ConfigAction::Show => {
            let text = toml::to_string_pretty(&cfg).context("serializing config")?;
            print!("{text}");
        }
        ConfigAction::Add { path } => {
            let expanded = paths::expand_tilde(&path.to_string_lossy());
            if !expanded.exists() {
                return Err(CoreError::UnreadableFile(expanded, "path does not exist".to_string()).into());
            }
            let canonical = expanded.to_string_lossy().into_owned();
            if !cfg.sources.paths.contains(&canonical) {
                cfg.sources.paths.push(canonical);
                config::save_config(config_path, &cfg)?;
            }
        }
        ConfigAction::Remove { path, all, yes } => {
            if all {
                if !yes && !confirm_twice("remove ALL configured source paths?") {
                    println!("aborted");
                    return Ok(0);
                }
                cfg.sources.paths.clear();
            } else if let Some(path) = path {
                let canonical = paths::expand_tilde(&path.to_string_lossy()).to_string_lossy().into_owned();
                if !yes && !confirm_twice(&format!("remove source path {canonical}?")) {
                    println!("aborted");
                    return Ok(0);
                }
                cfg.sources.paths.retain(|p| p != &canonical);
            } else {
                eprintln!("specify a path or --all");
                return Ok(1);
            }
            config::save_config(config_path, &cfg)?;
        }
    }
    Ok(0)
}

fn confirm_twice(prompt: &str) -> bool {
    for _ in 0..2 {
        print!("{prompt} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        if !line.trim().eq_ignore_ascii_case("y") {
            return false;
        }
    }
    true
}

/// Crash-recovery sweep: drop any `in_progress` chunk left behind by an
/// interrupted flush, deleting its orphan segment file and rewriting the
/// manifest so readers never see it. Idempotent: a manifest with no
/// `in_progress` entries is untouched.
///
/// Writer-only: this mutates the index directory, so it must run under the
/// lock (called from `cmd_index` after `lock::acquire` succeeds). Readers
/// (`cmd_find`) never call this — they bypass the lock and simply tolerate
/// `in_progress` chunks by skipping them (spec §5; `query::search` only
/// consults `manifest.complete_chunks()`).
fn recover_orphan_chunks(data_dir: &std::path::Path) -> Result<()> {
    let manifest_path = paths::manifest_file(data_dir);
    let mut manifest = manifest::load_manifest(&manifest_path)?;
    let dropped = manifest::prune_in_progress(&mut manifest);
    if dropped.is_empty() {
        return Ok(());
    }
    for chunk_id in &dropped {
        let chunk_path = paths::chunk_file(data_dir, *chunk_id);
        match std::fs::remove_file(&chunk_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CoreError::IoFatal(e.to_string()).into()),
        }
        tracing::warn!(chunk_id, "removed orphan in_progress chunk from a prior crash");
    }
    manifest::save_manifest(&manifest_path, &manifest)?;
    Ok(())
}

fn cmd_index(config_path: &PathBuf, data_dir: &PathBuf) -> Result<i32> {
    let cfg = config::load_config(config_path)?;
    if !data_dir.exists() {
        return Err(CoreError::NotInitialized(data_dir.clone()).into());
    }
    paths::ensure_data_dirs(data_dir)?;

    match lock::acquire(data_dir) {
        Ok(()) => {}
        Err(CoreError::LockHeld { pid, hostname }) => {
            if lock::is_stale(data_dir)? {
                lock::reclaim(data_dir)?;
                lock::acquire(data_dir)?;
            } else {
                return Err(CoreError::LockHeld { pid, hostname }.into());
            }
        }
        Err(e) => return Err(e.into()),
    }

    // Crash-recovery sweep only runs once we hold the lock: a concurrent
    // `index` that loses the race must fail with `LockHeld` before anything
    // destructive touches the directory (spec §5, S6).
    let result = recover_orphan_chunks(data_dir).and_then(|()| run_index(&cfg, data_dir));
    let _ = lock::release(data_dir);
    result?;
    Ok(0)
}

/// `reindex_on_modify = false`: skip the rebuild entirely if a complete
/// manifest already exists and is newer than every configured source
/// root's own directory mtime. See DESIGN.md Open Question 6 for why
/// directory-mtime granularity was chosen over content hashing.
fn index_is_up_to_date(cfg: &Config, data_dir: &std::path::Path) -> bool {
    let manifest_path = paths::manifest_file(data_dir);
    if !manifest_path.exists() {
        return false;
    }
    let Ok(manifest) = manifest::load_manifest(&manifest_path) else {
        return false;
    };
    if manifest.chunks.is_empty() || manifest.chunks.iter().any(|c| c.status != ChunkStatus::Complete) {
        return false;
    }

    cfg.sources
        .paths
        .iter()
        .map(|p| paths::expand_tilde(p))
        .all(|root| {
            std::fs::metadata(&root)
                .and_then(|m| m.modified())
                .map(|modified| {
                    modified
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| (d.as_secs() as i64) <= manifest.updated_at)
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        })
}

fn run_index(cfg: &Config, data_dir: &std::path::Path) -> Result<()> {
    if !cfg.index.reindex_on_modify && index_is_up_to_date(cfg, data_dir) {
        println!("index is up to date, skipping rebuild (reindex_on_modify = false)");
        return Ok(());
    }

    tombstone::move_segments_to_tombstones(data_dir)?;

    let roots: Vec<PathBuf> = cfg.sources.paths.iter().map(|p| paths::expand_tilde(p)).collect();
    let mut skip_folders: Vec<String> = DEFAULT_SKIP_FOLDERS.iter().map(|s| s.to_string()).collect();
    skip_folders.extend(cfg.sources.ignore.iter().cloned());

    let crawl_opts = CrawlOptions {
        roots,
        include_extensions: cfg.sources.include_extensions.clone(),
        exclude_extensions: cfg.sources.exclude_extensions.clone(),
        skip_folders,
        include_hidden: false,
        max_files_per_folder: 0,
        skip_binary_files: cfg.index.skip_binary_files,
    };

    let bar = spinner("crawling...");
    let entries = crawler::crawl(&crawl_opts);
    bar.finish_with_message(format!("crawled {} files", entries.len()));

    let progress_bar = spinner("indexing...");
    let ctx = RunContext::new(cfg.clone()).with_progress(std::sync::Arc::new({
        let bar = progress_bar.clone();
        move |ev: crate::context::ProgressEvent| {
            bar.set_message(ev.message);
        }
    }));

    let mut manifest = Manifest::new_empty();
    let mut next_chunk_id: u32 = 1;

    let total_processed = build_chunks(&ctx, &entries, |chunk| -> Result<(), CoreError> {
        let chunk_id = next_chunk_id;
        next_chunk_id += 1;
        let doc_count = chunk.doc_count();
        let token_count = chunk.total_tokens();
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        manifest.chunks.push(ChunkInfo {
            id: chunk_id,
            filename: format!("{chunk_id:03}.idx"),
            status: ChunkStatus::InProgress,
            doc_count,
            token_count,
            created_at,
        });
        manifest::save_manifest(&paths::manifest_file(data_dir), &manifest)?;

        codec::write_chunk(&paths::chunk_file(data_dir, chunk_id), &chunk)?;

        if let Some(info) = manifest.chunks.iter_mut().find(|c| c.id == chunk_id) {
            info.status = ChunkStatus::Complete;
        }
        manifest.recompute_aggregates();
        manifest::save_manifest(&paths::manifest_file(data_dir), &manifest)?;

        Ok(())
    })
    .map_err(anyhow::Error::from)?;

    progress_bar.finish_with_message(format!("indexed {total_processed} documents across {} chunks", next_chunk_id - 1));
    Ok(())
}

fn cmd_find(config_path: &PathBuf, data_dir: &std::path::Path, query: &str) -> Result<i32> {
    let cfg = config::load_config(config_path)?;
    if !data_dir.exists() {
        return Err(CoreError::NotInitialized(data_dir.to_path_buf()).into());
    }
    // Readers bypass the lock and never mutate the index: `in_progress`
    // chunks are simply skipped by `query::search` via `manifest.complete_chunks()`
    // (spec §5). Crash-recovery cleanup is the writer's job, run under the lock.
    let manifest = manifest::load_manifest(&paths::manifest_file(data_dir))?;
    if let Some(mismatch) = manifest.check_platform() {
        eprintln!("warning: {mismatch}");
    }

    let ctx = RunContext::new(cfg.clone());
    let limit = cfg.search.default_limit;
    let scored = query::search(&ctx, data_dir, &manifest, query, limit).map_err(anyhow::Error::from)?;

    let original_terms = query::original_terms(query);
    let mut shown = 0usize;
    for doc in scored {
        if ctx.cancel.is_cancelled() {
            break;
        }
        // Highlight against the raw query words *and* whatever vocabulary
        // terms actually scored this document, so a fuzzy-corrected hit
        // (matched against the indexed term, not the literal typo) still
        // produces a snippet instead of being dropped by the zero-snippet
        // post-filter.
        let mut display_terms = original_terms.clone();
        for term in &doc.matched_terms {
            if !display_terms.contains(term) {
                display_terms.push(term.clone());
            }
        }
        match snippet::build_result(&doc.path, doc.score, &display_terms) {
            Ok(Some(result)) => {
                shown += 1;
                println!("{}  (score {:.4})", result.path.display(), result.score);
                for s in &result.snippets {
                    println!("  {}: {}", s.line_number, s.text);
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %doc.path.display(), error = %e, "skipping unreadable result");
            }
        }
    }
    if shown == 0 {
        println!("no results");
    }
    Ok(0)
}

fn cmd_clean(data_dir: &std::path::Path) -> Result<i32> {
    let (bytes_freed, files_deleted) = tombstone::clear_tombstones(data_dir)?;
    println!("freed {bytes_freed} bytes across {files_deleted} files");
    Ok(0)
}

fn cmd_version(data_dir: &std::path::Path) -> Result<i32> {
    println!("mneme {}", env!("CARGO_PKG_VERSION"));
    let manifest_path = paths::manifest_file(data_dir);
    if manifest_path.exists() {
        if let Ok(manifest) = manifest::load_manifest(&manifest_path) {
            println!("index manifest version {}", manifest.version);
        }
    }
    Ok(0)
}

pub fn map_exit_code(result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            exit_code_for(&e)
        }
    }
}
