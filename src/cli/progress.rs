//! Progress bar and summary reporting for CLI syncs.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::download::ProgressEvent;
use crate::format::{JobState, format_bytes, format_duration, progress_line};
use crate::stats::BatchStats;
use crate::tree::{CatalogTree, NodeId};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates the batch progress bar, one step per job.
pub fn make_progress_bar(jobs: usize) -> ProgressBar {
    let bar = ProgressBar::new(jobs as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress template is valid")
            .progress_chars("━━╌"),
    );
    bar
}

/// Renders one event from a running batch.
pub fn render_event(bar: &ProgressBar, event: &ProgressEvent) {
    let total = usize::try_from(bar.length().unwrap_or(0)).unwrap_or(usize::MAX);
    match event {
        ProgressEvent::BatchStarted { total } => bar.set_length(*total as u64),
        ProgressEvent::Progress {
            index,
            filename,
            bytes,
            total: size,
        } => bar.set_message(progress_line(
            *index,
            total,
            filename,
            JobState::Downloading {
                bytes: *bytes,
                total: *size,
            },
        )),
        ProgressEvent::Skipped { index, filename } => {
            bar.set_message(progress_line(*index, total, filename, JobState::Skipping));
            bar.inc(1);
        }
        ProgressEvent::Completed {
            filename, size, ..
        } => {
            bar.println(format!("  {filename} ({})", format_bytes(*size)));
            bar.inc(1);
        }
        ProgressEvent::ResolveFailed { name, trace, .. } => {
            bar.println(format!(
                "  {} could not resolve {name}\n    {trace}",
                style("error:").red().bold()
            ));
            bar.inc(1);
        }
        ProgressEvent::Failed {
            filename, trace, ..
        } => {
            bar.println(format!(
                "  {} {filename}\n    {trace}",
                style("error:").red().bold()
            ));
            bar.inc(1);
        }
    }
}

/// Prints a summary of a finished batch.
pub fn print_summary(stats: &BatchStats) {
    println!("\n{SEPARATOR}");
    println!(
        "Completed. Downloaded {} files, skipped {} files",
        stats.files_downloaded, stats.files_skipped
    );
    if stats.files_downloaded > 0 {
        println!("  Total size:        {}", format_bytes(stats.total_bytes));
        println!("  Total time:        {}", format_duration(stats.elapsed));
        println!(
            "  Average speed:     {}/s",
            format_bytes(stats.average_speed())
        );
    }
    println!("{SEPARATOR}");
}

/// Prints pending items per course.
pub fn print_status(tree: &CatalogTree) {
    if tree.roots().is_empty() {
        println!("No cached courses. Run `learn-sync sync --catalog FILE` first.");
        return;
    }

    println!("\n{SEPARATOR}");
    for &root in tree.roots() {
        println!("{}", style(tree.name(root)).bold());
        print_pending(tree, root, 1);
    }
    println!("{SEPARATOR}");
    println!(
        "  {} item(s) pending, {} already present or ignored",
        tree.visible_leaf_count(),
        tree.leaf_count() - tree.visible_leaf_count()
    );
    println!("{SEPARATOR}\n");
}

fn print_pending(tree: &CatalogTree, id: NodeId, depth: usize) {
    for &child in tree.children(id) {
        if !tree.is_visible(child) {
            continue;
        }
        let indent = "  ".repeat(depth);
        if tree.leaf(child).is_some() {
            println!("{indent}{}", tree.name(child));
        } else if has_visible_leaf(tree, child) {
            println!("{indent}{}/", tree.name(child));
            print_pending(tree, child, depth + 1);
        }
    }
}

fn has_visible_leaf(tree: &CatalogTree, id: NodeId) -> bool {
    tree.children(id).iter().any(|&child| {
        if tree.leaf(child).is_some() {
            tree.is_visible(child)
        } else {
            has_visible_leaf(tree, child)
        }
    })
}
