//! Command-line front end: argument parsing and the `status`, `sync` and
//! `ignore` commands.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::download::{Downloader, spawn_batch};
use crate::error::{Error, Result};
use crate::node::LeafKind;
use crate::remote::{Authenticator, HttpRemote, JsonCatalog, StaticToken};
use crate::select::{select_all, select_kind, select_path};
use crate::session::SyncSession;

use progress::{make_progress_bar, print_status, print_summary, render_event};

/// Options for the `sync` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncArgs {
    /// JSON snapshot of the course catalog.
    pub catalog: Option<PathBuf>,
    pub all: bool,
    pub files: bool,
    pub lectures: bool,
    /// Display-name paths to select, like `Course/Week 1`.
    pub select: Vec<String>,
    /// Courses to sync; overrides `sync.courses` from the config file.
    pub courses: Vec<String>,
    /// Mark the selection as ignored instead of downloading it.
    pub ignore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Sync(SyncArgs),
    Ignore { paths: Vec<String> },
    Help,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub command: Command,
}

pub fn print_usage() {
    eprintln!("Usage: learn-sync [OPTIONS] <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                  Show cached courses and pending items");
    eprintln!("  sync                    Merge a fresh listing, then download the selection");
    eprintln!("  ignore <PATH>...        Never offer these items again");
    eprintln!();
    eprintln!("Sync options:");
    eprintln!("  --catalog <FILE>        Course catalog snapshot (JSON)");
    eprintln!("  --course <NAME>         Only sync this course (repeatable)");
    eprintln!("  --all                   Select everything pending");
    eprintln!("  --files                 Select all files");
    eprintln!("  --lectures              Select all recorded lectures");
    eprintln!("  --select <PATH>         Select a folder or item (repeatable)");
    eprintln!("  --ignore                Mark the selection ignored instead of downloading");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --dir <DIR>             Download directory (env: LEARN_SYNC_DIR)");
    eprintln!("  --config <FILE>         Config file");
    eprintln!("  -h, --help              Show this help");
    eprintln!();
    eprintln!("The session token is read from LEARN_SYNC_TOKEN.");
}

fn value(args: &[String], i: &mut usize, flag: &str) -> std::result::Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{flag} requires a value"))
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns a message describing the first invalid argument.
pub fn parse_args(args: &[String]) -> std::result::Result<CliArgs, String> {
    let mut dir = None;
    let mut config = None;
    let mut command_name: Option<String> = None;
    let mut sync = SyncArgs::default();
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                return Ok(CliArgs {
                    dir,
                    config,
                    command: Command::Help,
                });
            }
            "--dir" => dir = Some(PathBuf::from(value(args, &mut i, "--dir")?)),
            "--config" => config = Some(PathBuf::from(value(args, &mut i, "--config")?)),
            "--catalog" => sync.catalog = Some(PathBuf::from(value(args, &mut i, "--catalog")?)),
            "--course" => sync.courses.push(value(args, &mut i, "--course")?),
            "--select" => sync.select.push(value(args, &mut i, "--select")?),
            "--all" => sync.all = true,
            "--files" => sync.files = true,
            "--lectures" => sync.lectures = true,
            "--ignore" => sync.ignore = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            word => {
                if command_name.is_none() {
                    command_name = Some(word.to_string());
                } else {
                    positional.push(word.to_string());
                }
            }
        }
        i += 1;
    }

    let command = match command_name.as_deref() {
        None => Command::Help,
        Some("status") => Command::Status,
        Some("sync") => {
            if let Some(extra) = positional.first() {
                return Err(format!("unexpected argument {extra}"));
            }
            Command::Sync(sync)
        }
        Some("ignore") => {
            if positional.is_empty() {
                return Err("ignore requires at least one path".to_string());
            }
            Command::Ignore { paths: positional }
        }
        Some(other) => return Err(format!("unknown command {other}")),
    };

    Ok(CliArgs {
        dir,
        config,
        command,
    })
}

/// Runs a parsed command.
///
/// # Errors
///
/// Returns configuration, cache, listing and authentication errors.
/// Individual download failures are reported, not returned.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.dir {
        config = config.with_download_dir(dir);
    }

    match args.command {
        Command::Help => {
            print_usage();
            Ok(())
        }
        Command::Status => {
            let session = SyncSession::open(&config.sync.download_dir)?;
            print_status(session.tree());
            Ok(())
        }
        Command::Ignore { paths } => run_ignore(&config, &paths),
        Command::Sync(sync) => run_sync(&config, sync).await,
    }
}

fn run_ignore(config: &AppConfig, paths: &[String]) -> Result<()> {
    let mut session = SyncSession::open(&config.sync.download_dir)?;
    for path in paths {
        if !select_path(session.tree_mut(), path) {
            return Err(Error::Config(format!("no cached item at {path}")));
        }
    }
    let marked = session.ignore_selected()?;
    session.save()?;
    println!("Ignored {marked} item(s).");
    Ok(())
}

async fn run_sync(config: &AppConfig, args: SyncArgs) -> Result<()> {
    let catalog = args.catalog.as_deref().ok_or_else(|| {
        Error::Config("no course source: pass --catalog FILE".to_string())
    })?;
    let source = JsonCatalog::from_path(catalog)?;
    let courses = if args.courses.is_empty() {
        &config.sync.courses
    } else {
        &args.courses
    };

    let mut session = SyncSession::open(&config.sync.download_dir)?;
    session.sync(&source, courses).await?;

    let tree = session.tree_mut();
    if args.all {
        select_all(tree);
    }
    if args.files {
        select_kind(tree, LeafKind::File);
    }
    if args.lectures {
        select_kind(tree, LeafKind::RecordedLecture);
    }
    for path in &args.select {
        if !select_path(tree, path) {
            log::warn!("Nothing matches --select {path}");
            eprintln!("Warning: nothing matches {path}");
        }
    }

    if args.ignore {
        let marked = session.ignore_selected()?;
        session.save()?;
        println!("Ignored {marked} item(s).");
        return Ok(());
    }

    let jobs = session.jobs();
    if jobs.is_empty() {
        session.save()?;
        println!(
            "Nothing selected. {} item(s) pending; use --all, --files, --lectures or --select.",
            session.tree().visible_leaf_count()
        );
        return Ok(());
    }

    let token = StaticToken::new(config.token.clone()).authenticate().await?;
    let remote = HttpRemote::new(&config.remote, &token)?;
    let downloader = Arc::new(Downloader::new(remote));

    let bar = make_progress_bar(jobs.len());
    let mut handle = spawn_batch(downloader, jobs.clone());
    while let Some(event) = handle.events.recv().await {
        render_event(&bar, &event);
    }
    bar.finish_and_clear();

    let outcome = handle.finish().await?;
    session.finish_batch(&jobs, &outcome)?;
    print_summary(&outcome.stats);
    Ok(())
}
